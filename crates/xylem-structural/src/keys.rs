//! Byte-exact key and value codec for the structural index.
//!
//! The whole index lives in one ordered store, split into disjoint key
//! regions by the first byte:
//!
//! ```text
//! name-key  [ kind : 1 ][ sym : 2 BE ][ ns_sym : 2 BE ][ doc : 4 BE ][ node id bytes ]
//! doc-key   [ 0x02 : 1 ][ doc : 4 BE ][ kind : 1 ][ sym : 2 BE ][ ns_sym : 2 BE ]
//! ```
//!
//! Every numeric field is big-endian: lexicographic byte order of the keys
//! must equal numeric order, and (through the node-id codec) document
//! order, or range scans stop meaning anything.
//!
//! The stored value packs the node's storage address with `units % 8` of
//! its node id in bits 24–31, which the document store leaves clear. The
//! whole-byte part of the unit count is recovered from the key length.

use xylem_types::name::SymbolicName;
use xylem_types::node_id::NodeId;
use xylem_types::{DocumentId, NameKind, StorageAddress, Symbol};

/// First byte of every doc-key; name-key kinds sort strictly below it.
pub const DOC_KEY_TAG: u8 = 0x02;

/// Fixed prefix length of a name-key.
pub const NAME_KEY_PREFIX_LEN: usize = 9;

/// Length of a doc-key.
pub const DOC_KEY_LEN: usize = 10;

/// Length of a doc-key prefix.
pub const DOC_KEY_PREFIX_LEN: usize = 5;

const VALUE_BITS_SHIFT: u32 = 24;
const VALUE_BITS_MASK: u64 = 0xFF << VALUE_BITS_SHIFT;

/// Full name-key for one indexed node.
#[must_use]
pub fn name_key(name: SymbolicName, doc: DocumentId, node_id: &NodeId) -> Vec<u8> {
    let mut key = vec![0_u8; NAME_KEY_PREFIX_LEN + node_id.size()];
    write_name_key_prefix(&mut key, name, doc.get());
    node_id.serialize_into(&mut key, NAME_KEY_PREFIX_LEN);
    key
}

/// 9-byte prefix covering every node of `(name, doc)`.
///
/// `doc_raw` is a raw docId so callers can form the exclusive upper bound
/// of a scan with `doc.successor_raw()`.
#[must_use]
pub fn name_key_prefix(name: SymbolicName, doc_raw: u32) -> [u8; NAME_KEY_PREFIX_LEN] {
    let mut key = [0_u8; NAME_KEY_PREFIX_LEN];
    write_name_key_prefix(&mut key, name, doc_raw);
    key
}

fn write_name_key_prefix(key: &mut [u8], name: SymbolicName, doc_raw: u32) {
    key[0] = name.kind.as_byte();
    key[1..3].copy_from_slice(&name.sym.get().to_be_bytes());
    key[3..5].copy_from_slice(&name.ns_sym.get().to_be_bytes());
    key[5..9].copy_from_slice(&doc_raw.to_be_bytes());
}

/// Per-document inventory key for one qname.
#[must_use]
pub fn doc_key(doc: DocumentId, name: SymbolicName) -> [u8; DOC_KEY_LEN] {
    let mut key = [0_u8; DOC_KEY_LEN];
    key[0] = DOC_KEY_TAG;
    key[1..5].copy_from_slice(&doc.get().to_be_bytes());
    key[5] = name.kind.as_byte();
    key[6..8].copy_from_slice(&name.sym.get().to_be_bytes());
    key[8..10].copy_from_slice(&name.ns_sym.get().to_be_bytes());
    key
}

/// 5-byte prefix covering every doc-key of `doc_raw`.
#[must_use]
pub fn doc_key_prefix(doc_raw: u32) -> [u8; DOC_KEY_PREFIX_LEN] {
    let mut key = [0_u8; DOC_KEY_PREFIX_LEN];
    key[0] = DOC_KEY_TAG;
    key[1..5].copy_from_slice(&doc_raw.to_be_bytes());
    key
}

/// Document id embedded in a name-key.
#[must_use]
pub fn read_doc_id(name_key: &[u8]) -> Option<DocumentId> {
    let bytes = name_key.get(5..9)?;
    DocumentId::new(u32::from_be_bytes(bytes.try_into().ok()?))
}

/// Interned qname embedded in a doc-key.
#[must_use]
pub fn read_symbolic_name(doc_key: &[u8]) -> Option<SymbolicName> {
    if doc_key.len() != DOC_KEY_LEN || doc_key[0] != DOC_KEY_TAG {
        return None;
    }
    let kind = NameKind::from_byte(doc_key[5])?;
    let sym = u16::from_be_bytes(doc_key[6..8].try_into().ok()?);
    let ns_sym = u16::from_be_bytes(doc_key[8..10].try_into().ok()?);
    Some(SymbolicName::new(
        kind,
        Symbol::from_raw(sym),
        Symbol::from_raw(ns_sym),
    ))
}

/// Pack a storage address and a node-id unit count into a store value.
///
/// Only `units % 8` is stored; the rest of the count is implied by the key
/// length. The address's bits 24–31 are clear by construction
/// ([`StorageAddress`] masks them), so the fields cannot collide.
#[must_use]
pub fn encode_value(address: StorageAddress, units: u32) -> u64 {
    address.get() | (u64::from(units % 8) << VALUE_BITS_SHIFT)
}

/// Recover the storage address from a store value.
#[must_use]
pub fn address_from_value(value: u64) -> StorageAddress {
    StorageAddress::new(value & !VALUE_BITS_MASK)
}

/// Recover the node-id unit count from a name-key length and its value.
///
/// A stored low-count of zero means the final byte is fully used.
#[must_use]
pub fn units_from(key_len: usize, value: u64) -> u32 {
    let bits = ((value >> VALUE_BITS_SHIFT) & 0xFF) as u32;
    let bits = if bits == 0 { 8 } else { bits };
    #[allow(clippy::cast_possible_truncation)]
    let whole_bytes = (key_len.saturating_sub(NAME_KEY_PREFIX_LEN + 1)) as u32;
    8 * whole_bytes + bits
}

/// Reconstruct the node id serialized in a name-key.
#[must_use]
pub fn read_node_id(name_key: &[u8], value: u64) -> Option<NodeId> {
    if name_key.len() <= NAME_KEY_PREFIX_LEN {
        return None;
    }
    let units = units_from(name_key.len(), value);
    NodeId::from_serialized(units, name_key, NAME_KEY_PREFIX_LEN)
}
