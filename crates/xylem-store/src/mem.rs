//! In-memory reference implementation of [`OrderedStore`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

use xylem_error::Result;

use crate::{OrderedStore, compare_keys};

/// A `BTreeMap`-backed ordered store.
///
/// Fast enough for embedding small databases and for tests; hosts with
/// durability requirements wrap it with the snapshot codec in
/// [`crate::snapshot`] or supply their own [`OrderedStore`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemTree {
    map: BTreeMap<Vec<u8>, u64>,
}

impl MemTree {
    /// An empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], u64)> {
        self.map.iter().map(|(k, &v)| (k.as_slice(), v))
    }

    pub(crate) fn from_entries(entries: Vec<(Vec<u8>, u64)>) -> Self {
        Self {
            map: entries.into_iter().collect(),
        }
    }
}

impl OrderedStore for MemTree {
    fn get(&self, key: &[u8]) -> Result<Option<u64>> {
        Ok(self.map.get(key).copied())
    }

    fn range_scan(
        &self,
        from: &[u8],
        to: &[u8],
        visit: &mut dyn FnMut(&[u8], u64) -> bool,
    ) -> Result<()> {
        if compare_keys(from, to) != Ordering::Less {
            return Ok(());
        }
        for (key, &value) in self
            .map
            .range::<[u8], _>((Bound::Included(from), Bound::Excluded(to)))
        {
            if !visit(key, value) {
                break;
            }
        }
        Ok(())
    }

    fn insert(&mut self, key: &[u8], value: u64) -> Result<()> {
        self.map.insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.map.remove(key).is_some())
    }

    fn delete_range(&mut self, from: &[u8], to: &[u8]) -> Result<usize> {
        if compare_keys(from, to) != Ordering::Less {
            return Ok(0);
        }
        let doomed: Vec<Vec<u8>> = self
            .map
            .range::<[u8], _>((Bound::Included(from), Bound::Excluded(to)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.map.remove(key);
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemTree {
        let mut t = MemTree::new();
        for (k, v) in [
            (&b"aa"[..], 1_u64),
            (b"ab", 2),
            (b"ac", 3),
            (b"b", 4),
            (b"ca", 5),
        ] {
            t.insert(k, v).unwrap();
        }
        t
    }

    #[test]
    fn point_get() {
        let t = seeded();
        assert_eq!(t.get(b"ab").unwrap(), Some(2));
        assert_eq!(t.get(b"zz").unwrap(), None);
    }

    #[test]
    fn insert_overwrites_idempotently() {
        let mut t = MemTree::new();
        t.insert(b"k", 1).unwrap();
        t.insert(b"k", 9).unwrap();
        t.insert(b"k", 9).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(b"k").unwrap(), Some(9));
    }

    #[test]
    fn range_scan_half_open_in_order() {
        let t = seeded();
        let mut seen = Vec::new();
        t.range_scan(b"ab", b"ca", &mut |k, v| {
            seen.push((k.to_vec(), v));
            true
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![(b"ab".to_vec(), 2), (b"ac".to_vec(), 3), (b"b".to_vec(), 4)]
        );
    }

    #[test]
    fn range_scan_early_abort() {
        let t = seeded();
        let mut seen = 0;
        t.range_scan(b"", b"zz", &mut |_, _| {
            seen += 1;
            seen < 2
        })
        .unwrap();
        assert_eq!(seen, 2);
    }

    #[test]
    fn empty_or_inverted_range_is_a_no_op() {
        let t = seeded();
        let mut seen = 0;
        t.range_scan(b"b", b"b", &mut |_, _| {
            seen += 1;
            true
        })
        .unwrap();
        t.range_scan(b"z", b"a", &mut |_, _| {
            seen += 1;
            true
        })
        .unwrap();
        assert_eq!(seen, 0);
    }

    #[test]
    fn delete_one() {
        let mut t = seeded();
        assert!(t.delete(b"b").unwrap());
        assert!(!t.delete(b"b").unwrap());
        assert_eq!(t.get(b"b").unwrap(), None);
    }

    #[test]
    fn delete_range_counts() {
        let mut t = seeded();
        let n = t.delete_range(b"aa", b"b").unwrap();
        assert_eq!(n, 3);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(b"b").unwrap(), Some(4));
        assert_eq!(t.delete_range(b"z", b"a").unwrap(), 0);
    }
}
