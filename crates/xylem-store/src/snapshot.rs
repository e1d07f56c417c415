//! Durable snapshot codec for [`MemTree`].
//!
//! Wire format, little-endian integers:
//!
//! ```text
//! [ magic "XYTR" : 4 ][ version : u16 ][ entry count : u64 ]
//! [ key len : u32 ][ key bytes ][ value : u64 ]   * entry count
//! [ xxh64 over everything above : u64 ]
//! ```
//!
//! Validation failures surface as [`XylemError::Corrupt`]; truncation as
//! [`XylemError::ShortRead`]. Snapshots are derived state: a corrupt one
//! is rebuilt from the document store, never repaired.

use std::io::{Read, Write};

use xxhash_rust::xxh64::xxh64;
use xylem_error::{Result, XylemError};

use crate::MemTree;

/// Snapshot file magic.
pub const TREE_SNAPSHOT_MAGIC: [u8; 4] = *b"XYTR";

/// Current snapshot format version.
pub const TREE_SNAPSHOT_VERSION: u16 = 1;

const CHECKSUM_SEED: u64 = 0;

impl MemTree {
    /// Serialize the tree to `out`.
    pub fn write_snapshot(&self, out: &mut impl Write) -> Result<()> {
        let mut buf = Vec::with_capacity(16 + self.len() * 24);
        buf.extend_from_slice(&TREE_SNAPSHOT_MAGIC);
        buf.extend_from_slice(&TREE_SNAPSHOT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for (key, value) in self.iter() {
            let key_len = u32::try_from(key.len())
                .map_err(|_| XylemError::internal("store key exceeds u32 length"))?;
            buf.extend_from_slice(&key_len.to_le_bytes());
            buf.extend_from_slice(key);
            buf.extend_from_slice(&value.to_le_bytes());
        }
        let checksum = xxh64(&buf, CHECKSUM_SEED);
        buf.extend_from_slice(&checksum.to_le_bytes());
        out.write_all(&buf)?;
        Ok(())
    }

    /// Read a tree back from `input`, validating magic, version and
    /// checksum.
    pub fn read_snapshot(input: &mut impl Read) -> Result<Self> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        if data.len() < TREE_SNAPSHOT_MAGIC.len() + 2 + 8 + 8 {
            return Err(XylemError::ShortRead {
                expected: TREE_SNAPSHOT_MAGIC.len() + 2 + 8 + 8,
                actual: data.len(),
            });
        }

        let (payload, tail) = data.split_at(data.len() - 8);
        let stored = u64::from_le_bytes(tail.try_into().expect("8-byte tail"));
        if xxh64(payload, CHECKSUM_SEED) != stored {
            return Err(XylemError::corrupt("tree snapshot checksum mismatch"));
        }

        let mut cursor = Cursor::new(payload);
        let magic = cursor.take(4)?;
        if magic != TREE_SNAPSHOT_MAGIC {
            return Err(XylemError::corrupt("bad tree snapshot magic"));
        }
        let version = u16::from_le_bytes(cursor.take(2)?.try_into().expect("2 bytes"));
        if version != TREE_SNAPSHOT_VERSION {
            return Err(XylemError::Corrupt {
                detail: format!("unsupported tree snapshot version {version}"),
            });
        }
        let count = u64::from_le_bytes(cursor.take(8)?.try_into().expect("8 bytes"));

        let mut entries = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
        for _ in 0..count {
            let key_len =
                u32::from_le_bytes(cursor.take(4)?.try_into().expect("4 bytes")) as usize;
            let key = cursor.take(key_len)?.to_vec();
            let value = u64::from_le_bytes(cursor.take(8)?.try_into().expect("8 bytes"));
            entries.push((key, value));
        }
        if !cursor.is_empty() {
            return Err(XylemError::corrupt("trailing bytes in tree snapshot"));
        }
        Ok(Self::from_entries(entries))
    }
}

/// Minimal forward-only reader over a byte slice.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| XylemError::corrupt("length overflow in snapshot"))?;
        if end > self.data.len() {
            return Err(XylemError::ShortRead {
                expected: len,
                actual: self.data.len() - self.pos,
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrderedStore;
    use std::io::{Seek, SeekFrom};

    fn sample_tree() -> MemTree {
        let mut t = MemTree::new();
        t.insert(&[0x00, 0x01], 7).unwrap();
        t.insert(&[0x00, 0x02, 0xFF], 0xDEAD_BEEF).unwrap();
        t.insert(b"plain", u64::MAX).unwrap();
        t
    }

    #[test]
    fn snapshot_round_trip_in_memory() {
        let tree = sample_tree();
        let mut buf = Vec::new();
        tree.write_snapshot(&mut buf).unwrap();
        let back = MemTree::read_snapshot(&mut buf.as_slice()).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn snapshot_round_trip_through_file() {
        let tree = sample_tree();
        let mut file = tempfile::tempfile().unwrap();
        tree.write_snapshot(&mut file).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let back = MemTree::read_snapshot(&mut file).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn empty_tree_round_trips() {
        let tree = MemTree::new();
        let mut buf = Vec::new();
        tree.write_snapshot(&mut buf).unwrap();
        let back = MemTree::read_snapshot(&mut buf.as_slice()).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn flipped_bit_is_detected() {
        let tree = sample_tree();
        let mut buf = Vec::new();
        tree.write_snapshot(&mut buf).unwrap();
        let mid = buf.len() / 2;
        buf[mid] ^= 0x01;
        let err = MemTree::read_snapshot(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, XylemError::Corrupt { .. }), "{err}");
    }

    #[test]
    fn bad_magic_is_detected() {
        let tree = sample_tree();
        let mut buf = Vec::new();
        tree.write_snapshot(&mut buf).unwrap();
        buf[0] = b'Z';
        // Checksum now fails first; both paths are Corrupt.
        let err = MemTree::read_snapshot(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, XylemError::Corrupt { .. }));
    }

    #[test]
    fn truncation_is_detected() {
        let tree = sample_tree();
        let mut buf = Vec::new();
        tree.write_snapshot(&mut buf).unwrap();
        buf.truncate(10);
        let err = MemTree::read_snapshot(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(err, XylemError::ShortRead { .. }));
    }
}
