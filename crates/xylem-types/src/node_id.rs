//! Dewey-style hierarchical node identifiers.
//!
//! A [`NodeId`] encodes the path from the document root to a node as a
//! sequence of positive sibling positions ("levels"). Serialized ids are
//! bit-packed so that
//!
//! - lexicographic byte order of serialized ids agrees with document order,
//!   and
//! - for any ancestor `A`, every descendant `D` satisfies
//!   `bytes(A) < bytes(D) < bytes(A.next_sibling())`,
//!
//! which is what turns child/descendant/ancestor navigation into range
//! scans and point lookups on an ordered store.
//!
//! # Bit layout
//!
//! Levels are coded in 3-bit units with an all-ones marker prefix selecting
//! the width class:
//!
//! ```text
//! class 0:          0..6        one unit,   values 1..=6
//! class 1:  111  + 2 units      values 7..=62
//! class 2:  111 111 + 3 units   values 63..=510
//! class k:  k markers + k+1 payload units, values 8^k - 1 ..= 8^(k+1) - 2
//! ```
//!
//! The first payload unit of any class is `< 7`, so the code is prefix-free,
//! and larger values always compare greater bit-wise, so it is
//! order-preserving. `[1]` therefore costs 3 significant bits and
//! serializes to the single byte `0x20`.

use std::fmt;

/// Bits per coding unit.
const UNIT_BITS: u32 = 3;

/// All-ones unit introducing a wider width class.
const MARKER_UNIT: u8 = 0b111;

/// Largest level value the codec accepts (width class 19).
pub const MAX_LEVEL: u64 = (1_u64 << 60) - 2;

/// Widest class a valid writer can emit; wider input is corrupt.
const MAX_WIDTH_CLASS: u32 = 19;

/// Relationship of a node id to another, as seen from `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// The ids are identical.
    SelfNode,
    /// `self` is a direct child of the other node.
    IsChild,
    /// `self` is a strict descendant (grandchild or deeper) of the other node.
    IsDescendant,
    /// `self` is the direct parent of the other node.
    IsParent,
    /// `self` is a strict ancestor (grandparent or higher) of the other node.
    IsAncestor,
    /// The ids share a parent but differ in their last level.
    IsSibling,
    /// None of the above.
    Unrelated,
}

/// A hierarchical node identifier.
///
/// The empty id is the distinguished [`NodeId::DOCUMENT_NODE`], the
/// conceptual parent of every top-level node. The derived ordering on the
/// level vector is document order; property tests pin its agreement with
/// the byte order of [`NodeId::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    levels: Vec<u64>,
}

impl NodeId {
    /// The identifier of the document node itself.
    pub const DOCUMENT_NODE: Self = Self { levels: Vec::new() };

    /// Build an id from level values.
    ///
    /// Returns `None` if any level is zero or exceeds [`MAX_LEVEL`].
    #[must_use]
    pub fn from_levels(levels: &[u64]) -> Option<Self> {
        if levels.iter().any(|&v| v == 0 || v > MAX_LEVEL) {
            return None;
        }
        Some(Self {
            levels: levels.to_vec(),
        })
    }

    /// The level values of this id (empty for the document node).
    #[must_use]
    pub fn levels(&self) -> &[u64] {
        &self.levels
    }

    /// Depth below the document node.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Whether this is the document node sentinel.
    #[must_use]
    pub fn is_document_node(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of significant bits in the serialized form.
    #[must_use]
    pub fn units(&self) -> u32 {
        self.levels
            .iter()
            .map(|&v| UNIT_BITS * (2 * width_class(v) + 1))
            .sum()
    }

    /// Number of whole bytes needed to serialize this id.
    #[must_use]
    pub fn size(&self) -> usize {
        (self.units() as usize + 7) / 8
    }

    /// Write the serialized form into `buf[offset..offset + self.size()]`.
    ///
    /// The target range is zeroed first; trailing pad bits are zero.
    ///
    /// # Panics
    ///
    /// Panics if the target range does not fit in `buf`.
    pub fn serialize_into(&self, buf: &mut [u8], offset: usize) {
        let size = self.size();
        for byte in &mut buf[offset..offset + size] {
            *byte = 0;
        }
        let mut writer = UnitWriter::new(&mut buf[offset..offset + size]);
        for &level in &self.levels {
            let k = width_class(level);
            for _ in 0..k {
                writer.put(MARKER_UNIT);
            }
            let payload = level - class_base(k);
            for i in (0..=k).rev() {
                #[allow(clippy::cast_possible_truncation)]
                let unit = ((payload >> (UNIT_BITS * i)) & 0b111) as u8;
                writer.put(unit);
            }
        }
    }

    /// Serialize into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0_u8; self.size()];
        self.serialize_into(&mut buf, 0);
        buf
    }

    /// Reconstruct an id from `units` significant bits at
    /// `bytes[offset..]`.
    ///
    /// Returns `None` on malformed input: a unit count that is not a
    /// multiple of the unit width, truncated payloads, a zero level in
    /// class 0, or fewer bytes than the unit count requires.
    #[must_use]
    pub fn from_serialized(units: u32, bytes: &[u8], offset: usize) -> Option<Self> {
        if units % UNIT_BITS != 0 {
            return None;
        }
        let total_units = units / UNIT_BITS;
        let needed = (units as usize + 7) / 8;
        let data = bytes.get(offset..offset + needed)?;

        let reader = UnitReader::new(data);
        let mut levels = Vec::new();
        let mut idx = 0;
        while idx < total_units {
            let mut k = 0_u32;
            while idx < total_units && reader.get(idx) == MARKER_UNIT {
                k += 1;
                idx += 1;
            }
            if k > MAX_WIDTH_CLASS {
                return None;
            }
            // k+1 payload units must remain.
            if idx + k >= total_units {
                return None;
            }
            let mut payload = 0_u64;
            for _ in 0..=k {
                payload = (payload << UNIT_BITS) | u64::from(reader.get(idx));
                idx += 1;
            }
            let level = class_base(k) + payload;
            if level == 0 || level > MAX_LEVEL {
                return None;
            }
            levels.push(level);
        }
        Some(Self { levels })
    }

    /// The identifier of the parent node.
    ///
    /// A top-level node's parent is [`NodeId::DOCUMENT_NODE`]; the document
    /// node is its own parent.
    #[must_use]
    pub fn parent_id(&self) -> Self {
        match self.levels.split_last() {
            Some((_, rest)) => Self {
                levels: rest.to_vec(),
            },
            None => Self::DOCUMENT_NODE,
        }
    }

    /// The smallest id strictly greater than every descendant of `self`.
    ///
    /// Usable as the exclusive upper bound of a descendant range scan.
    /// Returns `None` for the document node and at the (unreachable in
    /// practice) level ceiling.
    #[must_use]
    pub fn next_sibling(&self) -> Option<Self> {
        let (&last, rest) = self.levels.split_last()?;
        if last >= MAX_LEVEL {
            return None;
        }
        let mut levels = rest.to_vec();
        levels.push(last + 1);
        Some(Self { levels })
    }

    /// Relationship of `self` to `other`, by prefix comparison on the
    /// level vectors.
    #[must_use]
    pub fn compute_relation(&self, other: &Self) -> Relation {
        let a = &self.levels;
        let b = &other.levels;
        if a == b {
            return Relation::SelfNode;
        }
        let common = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
        if common == b.len() {
            // `other` is a strict prefix: it is an ancestor of `self`.
            return if a.len() == b.len() + 1 {
                Relation::IsChild
            } else {
                Relation::IsDescendant
            };
        }
        if common == a.len() {
            return if b.len() == a.len() + 1 {
                Relation::IsParent
            } else {
                Relation::IsAncestor
            };
        }
        if a.len() == b.len() && common + 1 == a.len() {
            Relation::IsSibling
        } else {
            Relation::Unrelated
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.levels.is_empty() {
            return write!(f, "#document");
        }
        let mut first = true;
        for level in &self.levels {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{level}")?;
            first = false;
        }
        Ok(())
    }
}

/// Width class of a level value: the number of marker units preceding its
/// payload.
fn width_class(level: u64) -> u32 {
    debug_assert!(level >= 1 && level <= MAX_LEVEL);
    let mut k = 0_u32;
    // Class k tops out at 8^(k+1) - 2.
    while level > (1_u64 << (UNIT_BITS * (k + 1))) - 2 {
        k += 1;
    }
    k
}

/// Smallest level value of width class `k`.
///
/// Class 0 starts at 1 (0 is reserved so descendants can never serialize
/// equal to their ancestor); class k starts at `8^k - 1`.
fn class_base(k: u32) -> u64 {
    if k == 0 {
        0
    } else {
        (1_u64 << (UNIT_BITS * k)) - 1
    }
}

/// Writes 3-bit units MSB-first into a zeroed byte slice.
struct UnitWriter<'a> {
    buf: &'a mut [u8],
    bit: usize,
}

impl<'a> UnitWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, bit: 0 }
    }

    fn put(&mut self, unit: u8) {
        let byte = self.bit / 8;
        let used = self.bit % 8;
        let room = 8 - used;
        if room >= 3 {
            self.buf[byte] |= unit << (room - 3);
        } else {
            // Unit straddles the byte boundary.
            self.buf[byte] |= unit >> (3 - room);
            self.buf[byte + 1] |= (unit & ((1 << (3 - room)) - 1)) << (8 - (3 - room));
        }
        self.bit += 3;
    }
}

/// Reads 3-bit units MSB-first from a byte slice.
struct UnitReader<'a> {
    data: &'a [u8],
}

impl<'a> UnitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn get(&self, index: u32) -> u8 {
        let bit = index as usize * 3;
        let byte = bit / 8;
        let used = bit % 8;
        let room = 8 - used;
        if room >= 3 {
            (self.data[byte] >> (room - 3)) & 0b111
        } else {
            let high = (self.data[byte] & ((1 << room) - 1)) << (3 - room);
            let low = self.data[byte + 1] >> (8 - (3 - room));
            (high | low) & 0b111
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(levels: &[u64]) -> NodeId {
        NodeId::from_levels(levels).unwrap()
    }

    #[test]
    fn single_small_level_pins_the_wire_format() {
        let n = id(&[1]);
        assert_eq!(n.units(), 3);
        assert_eq!(n.size(), 1);
        assert_eq!(n.to_bytes(), vec![0x20]);
    }

    #[test]
    fn two_small_levels() {
        let n = id(&[1, 2]);
        // 001 010 -> 00101000
        assert_eq!(n.units(), 6);
        assert_eq!(n.to_bytes(), vec![0x28]);
    }

    #[test]
    fn class_boundaries() {
        // 6 is the last one-unit value, 7 the first marker-prefixed one.
        assert_eq!(id(&[6]).units(), 3);
        assert_eq!(id(&[6]).to_bytes(), vec![0b1100_0000]);

        let seven = id(&[7]);
        assert_eq!(seven.units(), 9);
        // 111 000 000 -> 11100000 0.......
        assert_eq!(seven.to_bytes(), vec![0xE0, 0x00]);

        let n62 = id(&[62]);
        // payload 55 = 110 111 -> 111 110 111 -> 11111011 1.......
        assert_eq!(n62.units(), 9);
        assert_eq!(n62.to_bytes(), vec![0xFB, 0x80]);

        let n63 = id(&[63]);
        // two markers, three payload units of zero.
        assert_eq!(n63.units(), 15);
    }

    #[test]
    fn zero_and_oversize_levels_rejected() {
        assert!(NodeId::from_levels(&[0]).is_none());
        assert!(NodeId::from_levels(&[1, 0, 2]).is_none());
        assert!(NodeId::from_levels(&[MAX_LEVEL + 1]).is_none());
        assert!(NodeId::from_levels(&[MAX_LEVEL]).is_some());
    }

    #[test]
    fn serialize_round_trip() {
        for levels in [
            vec![1],
            vec![3, 5, 2],
            vec![7],
            vec![62, 63],
            vec![1, 2, 510, 4],
            vec![6, 7, 8],
        ] {
            let n = id(&levels);
            let bytes = n.to_bytes();
            let back = NodeId::from_serialized(n.units(), &bytes, 0).unwrap();
            assert_eq!(back, n, "round trip of {n}");
        }
    }

    #[test]
    fn from_serialized_at_offset() {
        let n = id(&[4, 2]);
        let mut buf = vec![0xAA_u8; 3];
        n.serialize_into(&mut buf, 2);
        assert_eq!(buf[0], 0xAA);
        let back = NodeId::from_serialized(n.units(), &buf, 2).unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn from_serialized_rejects_garbage() {
        // Unit count not a multiple of three.
        assert!(NodeId::from_serialized(4, &[0x20], 0).is_none());
        // Marker with no payload room.
        assert!(NodeId::from_serialized(3, &[0xE0], 0).is_none());
        // Class-0 payload of zero.
        assert!(NodeId::from_serialized(3, &[0x00], 0).is_none());
        // Not enough bytes for the claimed unit count.
        assert!(NodeId::from_serialized(9, &[0xE0], 0).is_none());
    }

    #[test]
    fn document_node_is_empty() {
        let doc = NodeId::DOCUMENT_NODE;
        assert!(doc.is_document_node());
        assert_eq!(doc.units(), 0);
        assert_eq!(doc.size(), 0);
        assert!(doc.next_sibling().is_none());
        assert_eq!(doc.parent_id(), NodeId::DOCUMENT_NODE);
    }

    #[test]
    fn parent_of_top_level_node_is_document() {
        assert_eq!(id(&[3]).parent_id(), NodeId::DOCUMENT_NODE);
        assert_eq!(id(&[1, 2, 3]).parent_id(), id(&[1, 2]));
    }

    #[test]
    fn next_sibling_increments_last_level() {
        assert_eq!(id(&[1, 2]).next_sibling().unwrap(), id(&[1, 3]));
        assert_eq!(id(&[6]).next_sibling().unwrap(), id(&[7]));
    }

    #[test]
    fn relations() {
        let anc = id(&[1, 2]);
        assert_eq!(anc.compute_relation(&anc), Relation::SelfNode);
        assert_eq!(id(&[1, 2, 1]).compute_relation(&anc), Relation::IsChild);
        assert_eq!(
            id(&[1, 2, 1, 4]).compute_relation(&anc),
            Relation::IsDescendant
        );
        assert_eq!(anc.compute_relation(&id(&[1, 2, 1])), Relation::IsParent);
        assert_eq!(
            anc.compute_relation(&id(&[1, 2, 1, 4])),
            Relation::IsAncestor
        );
        assert_eq!(id(&[1, 3]).compute_relation(&anc), Relation::IsSibling);
        assert_eq!(id(&[1, 3]).compute_relation(&id(&[2, 3])), Relation::Unrelated);
        assert_eq!(id(&[2, 3]).compute_relation(&id(&[1, 2, 1])), Relation::Unrelated);
    }

    #[test]
    fn relations_involving_document_node() {
        let doc = NodeId::DOCUMENT_NODE;
        assert_eq!(id(&[1]).compute_relation(&doc), Relation::IsChild);
        assert_eq!(id(&[1, 1]).compute_relation(&doc), Relation::IsDescendant);
        assert_eq!(doc.compute_relation(&id(&[1])), Relation::IsParent);
        assert_eq!(doc.compute_relation(&id(&[1, 1])), Relation::IsAncestor);
    }

    #[test]
    fn siblings_at_top_level() {
        assert_eq!(id(&[1]).compute_relation(&id(&[2])), Relation::IsSibling);
    }

    #[test]
    fn document_order_matches_byte_order_on_samples() {
        let ids = [
            id(&[1]),
            id(&[1, 1]),
            id(&[1, 2]),
            id(&[1, 2, 1]),
            id(&[1, 3]),
            id(&[2]),
            id(&[6]),
            id(&[7]),
            id(&[62]),
            id(&[63]),
        ];
        for a in &ids {
            for b in &ids {
                assert_eq!(
                    a.cmp(b),
                    a.to_bytes().cmp(&b.to_bytes()),
                    "order disagreement between {a} and {b}"
                );
            }
        }
    }

    #[test]
    fn descendants_fall_inside_the_sibling_bound() {
        let anc = id(&[1, 2]);
        let bound = anc.next_sibling().unwrap();
        for desc in [id(&[1, 2, 1]), id(&[1, 2, 7]), id(&[1, 2, 1, 63])] {
            assert!(anc.to_bytes() < desc.to_bytes());
            assert!(desc.to_bytes() < bound.to_bytes());
        }
        // A true following node is outside the bound.
        assert!(id(&[1, 3]).to_bytes() >= bound.to_bytes());
    }

    #[test]
    fn display() {
        assert_eq!(id(&[1, 2, 3]).to_string(), "1.2.3");
        assert_eq!(NodeId::DOCUMENT_NODE.to_string(), "#document");
    }
}
