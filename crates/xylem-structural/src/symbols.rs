//! Interning of qualified-name parts to 16-bit symbols.
//!
//! Name-keys embed symbols rather than strings so every key keeps a fixed
//! 9-byte prefix. Symbols are handed out monotonically from 1 and are never
//! reassigned or evicted: keys persisted with a symbol stay valid for the
//! lifetime of the database, so the table is append-only and must be made
//! durable by the host (see [`SymbolTable::write_snapshot`]).

use std::collections::HashMap;
use std::io::{Read, Write};

use parking_lot::Mutex;
use xxhash_rust::xxh64::xxh64;
use xylem_error::{Result, XylemError};
use xylem_types::name::{QName, SymbolicName};
use xylem_types::{NameKind, Symbol};

/// Symbol snapshot magic.
pub const SYMBOL_SNAPSHOT_MAGIC: [u8; 4] = *b"XYSM";

/// Current symbol snapshot format version.
pub const SYMBOL_SNAPSHOT_VERSION: u16 = 1;

const CHECKSUM_SEED: u64 = 0;

/// Bidirectional intern table for local names and namespace URIs.
///
/// Thread-safe; shared between all workers of an index via `Arc`. Symbol 0
/// is pre-seeded as the empty string, which makes the empty namespace URI
/// intern to [`Symbol::NONE`] without a special case.
#[derive(Debug, Default)]
pub struct SymbolTable {
    inner: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    names: Interner,
    namespaces: Interner,
}

impl SymbolTable {
    /// An empty table (symbol 0 seeded in both halves).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a local name. Allocates a new symbol on first sight.
    pub fn symbol(&self, local: &str) -> Result<Symbol> {
        self.inner.lock().names.intern(local, "local-name")
    }

    /// Intern a namespace URI. The empty URI is [`Symbol::NONE`].
    pub fn ns_symbol(&self, uri: &str) -> Result<Symbol> {
        self.inner.lock().namespaces.intern(uri, "namespace")
    }

    /// Look up the local name behind a symbol.
    #[must_use]
    pub fn name(&self, sym: Symbol) -> Option<String> {
        self.inner.lock().names.resolve(sym)
    }

    /// Look up the namespace URI behind a symbol.
    #[must_use]
    pub fn namespace(&self, sym: Symbol) -> Option<String> {
        self.inner.lock().namespaces.resolve(sym)
    }

    /// Intern both halves of a qualified name.
    pub fn symbolic(&self, qname: &QName) -> Result<SymbolicName> {
        let mut tables = self.inner.lock();
        let sym = tables.names.intern(&qname.local, "local-name")?;
        let ns_sym = tables.namespaces.intern(&qname.ns_uri, "namespace")?;
        Ok(SymbolicName::new(qname.kind, sym, ns_sym))
    }

    /// Intern a `(kind, local, ns)` triple where the kind does not come
    /// from a [`QName`]; queries pass the kind separately.
    pub fn symbolic_parts(&self, kind: NameKind, local: &str, ns_uri: &str) -> Result<SymbolicName> {
        let mut tables = self.inner.lock();
        let sym = tables.names.intern(local, "local-name")?;
        let ns_sym = tables.namespaces.intern(ns_uri, "namespace")?;
        Ok(SymbolicName::new(kind, sym, ns_sym))
    }

    /// Reconstruct a [`QName`] from its interned form, if both symbols are
    /// known.
    #[must_use]
    pub fn qname(&self, name: SymbolicName) -> Option<QName> {
        let tables = self.inner.lock();
        let local = tables.names.resolve(name.sym)?;
        let ns_uri = tables.namespaces.resolve(name.ns_sym)?;
        Some(QName {
            local,
            ns_uri,
            kind: name.kind,
        })
    }

    /// Number of assigned local-name symbols (excluding the reserved 0).
    #[must_use]
    pub fn name_count(&self) -> usize {
        self.inner.lock().names.assigned()
    }

    /// Number of assigned namespace symbols (excluding the reserved 0).
    #[must_use]
    pub fn namespace_count(&self) -> usize {
        self.inner.lock().namespaces.assigned()
    }

    /// Serialize the table to `out`.
    ///
    /// Wire format, little-endian: magic, version, per half an entry count
    /// and length-prefixed UTF-8 strings for symbols `1..`, then an xxh64
    /// checksum over everything above.
    pub fn write_snapshot(&self, out: &mut impl Write) -> Result<()> {
        let tables = self.inner.lock();
        let mut buf = Vec::new();
        buf.extend_from_slice(&SYMBOL_SNAPSHOT_MAGIC);
        buf.extend_from_slice(&SYMBOL_SNAPSHOT_VERSION.to_le_bytes());
        tables.names.encode_into(&mut buf)?;
        tables.namespaces.encode_into(&mut buf)?;
        let checksum = xxh64(&buf, CHECKSUM_SEED);
        buf.extend_from_slice(&checksum.to_le_bytes());
        out.write_all(&buf)?;
        Ok(())
    }

    /// Read a table back from `input`, validating magic, version and
    /// checksum. Symbol identifiers are restored exactly.
    pub fn read_snapshot(input: &mut impl Read) -> Result<Self> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        if data.len() < SYMBOL_SNAPSHOT_MAGIC.len() + 2 + 8 {
            return Err(XylemError::ShortRead {
                expected: SYMBOL_SNAPSHOT_MAGIC.len() + 2 + 8,
                actual: data.len(),
            });
        }
        let (payload, tail) = data.split_at(data.len() - 8);
        let stored = u64::from_le_bytes(tail.try_into().expect("8-byte tail"));
        if xxh64(payload, CHECKSUM_SEED) != stored {
            return Err(XylemError::corrupt("symbol snapshot checksum mismatch"));
        }

        let mut pos = 0_usize;
        let magic = take(payload, &mut pos, 4)?;
        if magic != SYMBOL_SNAPSHOT_MAGIC {
            return Err(XylemError::corrupt("bad symbol snapshot magic"));
        }
        let version = u16::from_le_bytes(take(payload, &mut pos, 2)?.try_into().expect("2 bytes"));
        if version != SYMBOL_SNAPSHOT_VERSION {
            return Err(XylemError::Corrupt {
                detail: format!("unsupported symbol snapshot version {version}"),
            });
        }
        let names = Interner::decode_from(payload, &mut pos, "local-name")?;
        let namespaces = Interner::decode_from(payload, &mut pos, "namespace")?;
        if pos != payload.len() {
            return Err(XylemError::corrupt("trailing bytes in symbol snapshot"));
        }
        Ok(Self {
            inner: Mutex::new(Tables { names, namespaces }),
        })
    }
}

/// One half of the table: value -> symbol and symbol -> value.
#[derive(Debug)]
struct Interner {
    by_value: HashMap<String, Symbol>,
    by_symbol: Vec<String>,
}

impl Default for Interner {
    fn default() -> Self {
        let mut by_value = HashMap::new();
        by_value.insert(String::new(), Symbol::NONE);
        Self {
            by_value,
            by_symbol: vec![String::new()],
        }
    }
}

impl Interner {
    fn intern(&mut self, value: &str, kind: &'static str) -> Result<Symbol> {
        if let Some(&sym) = self.by_value.get(value) {
            return Ok(sym);
        }
        let next = self.by_symbol.len();
        let raw = u16::try_from(next).map_err(|_| XylemError::SymbolOverflow { kind })?;
        let sym = Symbol::from_raw(raw);
        self.by_value.insert(value.to_owned(), sym);
        self.by_symbol.push(value.to_owned());
        Ok(sym)
    }

    fn resolve(&self, sym: Symbol) -> Option<String> {
        self.by_symbol.get(sym.get() as usize).cloned()
    }

    fn assigned(&self) -> usize {
        self.by_symbol.len() - 1
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        let count = u32::try_from(self.assigned())
            .map_err(|_| XylemError::internal("interner size exceeds u32"))?;
        buf.extend_from_slice(&count.to_le_bytes());
        for value in &self.by_symbol[1..] {
            let len = u32::try_from(value.len())
                .map_err(|_| XylemError::internal("symbol value exceeds u32 length"))?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(value.as_bytes());
        }
        Ok(())
    }

    fn decode_from(payload: &[u8], pos: &mut usize, kind: &'static str) -> Result<Self> {
        let count = u32::from_le_bytes(take(payload, pos, 4)?.try_into().expect("4 bytes"));
        let mut interner = Self::default();
        for _ in 0..count {
            let len = u32::from_le_bytes(take(payload, pos, 4)?.try_into().expect("4 bytes"));
            let bytes = take(payload, pos, len as usize)?;
            let value = std::str::from_utf8(bytes)
                .map_err(|_| XylemError::corrupt("non-UTF-8 symbol value"))?;
            if interner.by_value.contains_key(value) {
                return Err(XylemError::corrupt("duplicate symbol value in snapshot"));
            }
            interner.intern(value, kind)?;
        }
        Ok(interner)
    }
}

fn take<'a>(payload: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(len)
        .ok_or_else(|| XylemError::corrupt("length overflow in symbol snapshot"))?;
    if end > payload.len() {
        return Err(XylemError::ShortRead {
            expected: len,
            actual: payload.len() - *pos,
        });
    }
    let slice = &payload[*pos..end];
    *pos = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_monotone_from_one() {
        let table = SymbolTable::new();
        assert_eq!(table.symbol("book").unwrap().get(), 1);
        assert_eq!(table.symbol("title").unwrap().get(), 2);
        assert_eq!(table.symbol("book").unwrap().get(), 1);
        assert_eq!(table.name_count(), 2);
    }

    #[test]
    fn empty_namespace_is_symbol_zero() {
        let table = SymbolTable::new();
        assert_eq!(table.ns_symbol("").unwrap(), Symbol::NONE);
        assert_eq!(table.ns_symbol("urn:example").unwrap().get(), 1);
        assert_eq!(table.namespace(Symbol::NONE).as_deref(), Some(""));
    }

    #[test]
    fn names_and_namespaces_are_independent_spaces() {
        let table = SymbolTable::new();
        let name = table.symbol("x").unwrap();
        let ns = table.ns_symbol("x").unwrap();
        assert_eq!(name.get(), 1);
        assert_eq!(ns.get(), 1);
        assert_eq!(table.name(name).as_deref(), Some("x"));
        assert_eq!(table.namespace(ns).as_deref(), Some("x"));
    }

    #[test]
    fn symbolic_resolves_both_halves() {
        let table = SymbolTable::new();
        let qname = QName::element("book", "urn:example");
        let sn = table.symbolic(&qname).unwrap();
        assert_eq!(sn.kind, NameKind::Element);
        assert_eq!(sn.sym.get(), 1);
        assert_eq!(sn.ns_sym.get(), 1);
        assert_eq!(table.qname(sn).unwrap(), qname);
    }

    #[test]
    fn unknown_symbol_resolves_to_none() {
        let table = SymbolTable::new();
        assert_eq!(table.name(Symbol::from_raw(42)), None);
    }

    #[test]
    fn snapshot_round_trip_preserves_identifiers() {
        let table = SymbolTable::new();
        let book = table.symbol("book").unwrap();
        let title = table.symbol("title").unwrap();
        let ns = table.ns_symbol("urn:example").unwrap();

        let mut buf = Vec::new();
        table.write_snapshot(&mut buf).unwrap();
        let back = SymbolTable::read_snapshot(&mut buf.as_slice()).unwrap();

        // Identifiers must survive exactly: keys embed them.
        assert_eq!(back.symbol("book").unwrap(), book);
        assert_eq!(back.symbol("title").unwrap(), title);
        assert_eq!(back.ns_symbol("urn:example").unwrap(), ns);
        assert_eq!(back.name_count(), 2);
        assert_eq!(back.namespace_count(), 1);

        // New names continue after the restored ones.
        assert_eq!(back.symbol("author").unwrap().get(), 3);
    }

    #[test]
    fn snapshot_corruption_is_detected() {
        let table = SymbolTable::new();
        table.symbol("book").unwrap();
        let mut buf = Vec::new();
        table.write_snapshot(&mut buf).unwrap();

        let mut flipped = buf.clone();
        let mid = flipped.len() / 2;
        flipped[mid] ^= 0x40;
        assert!(matches!(
            SymbolTable::read_snapshot(&mut flipped.as_slice()),
            Err(XylemError::Corrupt { .. })
        ));

        let mut truncated = buf;
        truncated.truncate(6);
        assert!(matches!(
            SymbolTable::read_snapshot(&mut truncated.as_slice()),
            Err(XylemError::ShortRead { .. })
        ));
    }
}
