//! Node proxies and the collections query operations traffic in.

use xylem_types::node_id::NodeId;
use xylem_types::{DocumentId, NameKind, StorageAddress};

/// Sentinel context id: propagate context by shallow copy only.
pub const NO_CONTEXT_ID: i32 = -1;

/// An opaque match annotation carried through structural lookups.
///
/// The structural index never creates matches; it only merges those a
/// driving proxy already carries (value-level matching belongs to other
/// indexes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub node_id: NodeId,
    pub offset: u32,
    pub len: u32,
}

/// A context edge recording which predicate position a proxy satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEdge {
    pub context_id: i32,
    pub node_id: NodeId,
}

/// A lightweight reference to a stored node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProxy {
    pub doc: DocumentId,
    pub node_id: NodeId,
    pub kind: NameKind,
    pub address: StorageAddress,
    context: Vec<ContextEdge>,
    matches: Vec<Match>,
}

impl NodeProxy {
    /// A proxy with empty context and no matches.
    #[must_use]
    pub fn new(doc: DocumentId, node_id: NodeId, kind: NameKind, address: StorageAddress) -> Self {
        Self {
            doc,
            node_id,
            kind,
            address,
            context: Vec::new(),
            matches: Vec::new(),
        }
    }

    /// The context edges recorded on this proxy.
    #[must_use]
    pub fn context(&self) -> &[ContextEdge] {
        &self.context
    }

    /// The match annotations carried by this proxy.
    #[must_use]
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Attach a match annotation.
    pub fn add_match(&mut self, m: Match) {
        self.matches.push(m);
    }

    /// Shallow context propagation: adopt the driving proxy's edges as-is.
    pub fn copy_context_from(&mut self, driver: &Self) {
        self.context = driver.context.clone();
    }

    /// Deep context propagation: adopt the driving proxy's edges and record
    /// a new edge tying this proxy to the driver under `context_id`.
    pub fn deep_copy_context_from(&mut self, driver: &Self, context_id: i32) {
        self.context = driver.context.clone();
        self.context.push(ContextEdge {
            context_id,
            node_id: driver.node_id.clone(),
        });
    }

    /// Merge the driving proxy's match annotations into this proxy.
    pub fn add_matches_from(&mut self, driver: &Self) {
        self.matches.extend(driver.matches.iter().cloned());
    }
}

/// Decides whether a scan hit becomes part of a result set.
///
/// `select` may veto a candidate (`None`) or replace it with a proxy of its
/// own (typically one carrying context from an outer expression). Selectors
/// must not renumber: the returned proxy stands for exactly the
/// `(doc, node_id)` it was asked about, and the index keeps the key's node
/// id and address authoritative on the emitted proxy.
pub trait NodeSelector {
    fn select(&self, doc: DocumentId, node_id: &NodeId) -> Option<NodeProxy>;
}

impl<F> NodeSelector for F
where
    F: Fn(DocumentId, &NodeId) -> Option<NodeProxy>,
{
    fn select(&self, doc: DocumentId, node_id: &NodeId) -> Option<NodeProxy> {
        self(doc, node_id)
    }
}

/// A collection of node proxies accumulated by a lookup.
///
/// `in_document_order` declares whether the set is globally ordered by
/// `(doc, node_id)`; descendant lookups over several ancestors leave it
/// false and callers sort when they need global order.
#[derive(Debug, Default, Clone)]
pub struct NodeSet {
    nodes: Vec<NodeProxy>,
    in_document_order: bool,
}

impl NodeSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty set with room for `capacity` proxies.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            in_document_order: false,
        }
    }

    /// Append a proxy.
    pub fn add(&mut self, proxy: NodeProxy) {
        self.nodes.push(proxy);
    }

    /// Number of proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate the proxies in insertion (or sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeProxy> {
        self.nodes.iter()
    }

    /// Whether the set is known to be in global document order.
    #[must_use]
    pub fn is_in_document_order(&self) -> bool {
        self.in_document_order
    }

    /// Declare the set already in document order without sorting.
    ///
    /// Used when the producing scans visited entries in `(doc, node)` order
    /// by construction.
    pub fn mark_in_document_order(&mut self) {
        self.in_document_order = true;
    }

    /// Sort into document order and drop duplicate `(doc, node_id)`
    /// entries, keeping the first occurrence.
    pub fn sort(&mut self) {
        self.nodes
            .sort_by(|a, b| a.doc.cmp(&b.doc).then_with(|| a.node_id.cmp(&b.node_id)));
        self.nodes
            .dedup_by(|b, a| a.doc == b.doc && a.node_id == b.node_id);
        self.in_document_order = true;
    }

    /// Consume the set, returning the proxies.
    #[must_use]
    pub fn into_vec(self) -> Vec<NodeProxy> {
        self.nodes
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a NodeProxy;
    type IntoIter = std::slice::Iter<'a, NodeProxy>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// A sorted, duplicate-free set of document ids.
#[derive(Debug, Default, Clone)]
pub struct DocumentSet {
    ids: Vec<DocumentId>,
}

impl DocumentSet {
    /// Build from any id collection; sorts and dedups.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = DocumentId>) -> Self {
        let mut ids: Vec<DocumentId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    /// Whether `doc` is in the set.
    #[must_use]
    pub fn contains(&self, doc: DocumentId) -> bool {
        self.ids.binary_search(&doc).is_ok()
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate the ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.ids.iter().copied()
    }

    /// Coalesce the ids into maximal contiguous raw ranges, both bounds
    /// inclusive.
    ///
    /// Documents loaded in batches get consecutive ids, so one wider scan
    /// replaces many per-document scans.
    #[must_use]
    pub fn contiguous_ranges(&self) -> Vec<(u32, u32)> {
        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for id in &self.ids {
            let raw = id.get();
            match ranges.last_mut() {
                Some((_, end)) if *end + 1 == raw => *end = raw,
                _ => ranges.push((raw, raw)),
            }
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(raw: u32) -> DocumentId {
        DocumentId::new(raw).unwrap()
    }

    fn nid(levels: &[u64]) -> NodeId {
        NodeId::from_levels(levels).unwrap()
    }

    fn proxy(d: u32, levels: &[u64]) -> NodeProxy {
        NodeProxy::new(
            doc(d),
            nid(levels),
            NameKind::Element,
            StorageAddress::new(0),
        )
    }

    #[test]
    fn contiguous_ranges_coalesce() {
        let docs = DocumentSet::from_ids([10, 11, 12, 15].map(doc));
        assert_eq!(docs.contiguous_ranges(), vec![(10, 12), (15, 15)]);
    }

    #[test]
    fn contiguous_ranges_singletons_and_empty() {
        assert!(DocumentSet::default().contiguous_ranges().is_empty());
        let docs = DocumentSet::from_ids([3, 7, 9].map(doc));
        assert_eq!(docs.contiguous_ranges(), vec![(3, 3), (7, 7), (9, 9)]);
    }

    #[test]
    fn document_set_dedups_and_sorts() {
        let docs = DocumentSet::from_ids([5, 3, 5, 4].map(doc));
        assert_eq!(docs.len(), 3);
        assert_eq!(docs.contiguous_ranges(), vec![(3, 5)]);
        assert!(docs.contains(doc(4)));
        assert!(!docs.contains(doc(6)));
    }

    #[test]
    fn node_set_sort_dedups_by_identity() {
        let mut set = NodeSet::new();
        set.add(proxy(2, &[1]));
        set.add(proxy(1, &[1, 2]));
        set.add(proxy(1, &[1]));
        set.add(proxy(1, &[1, 2]));
        assert!(!set.is_in_document_order());
        set.sort();
        assert!(set.is_in_document_order());
        let ids: Vec<_> = set.iter().map(|p| (p.doc.get(), p.node_id.clone())).collect();
        assert_eq!(
            ids,
            vec![
                (1, nid(&[1])),
                (1, nid(&[1, 2])),
                (2, nid(&[1])),
            ]
        );
    }

    #[test]
    fn shallow_context_copies_edges_only() {
        let mut driver = proxy(1, &[1]);
        driver.deep_copy_context_from(&proxy(1, &[2]), 7);
        assert_eq!(driver.context().len(), 1);

        let mut emitted = proxy(1, &[1, 1]);
        emitted.copy_context_from(&driver);
        assert_eq!(emitted.context(), driver.context());
    }

    #[test]
    fn deep_context_records_the_driver() {
        let driver = proxy(1, &[1, 2]);
        let mut emitted = proxy(1, &[1, 2, 1]);
        emitted.deep_copy_context_from(&driver, 3);
        assert_eq!(emitted.context().len(), 1);
        assert_eq!(emitted.context()[0].context_id, 3);
        assert_eq!(emitted.context()[0].node_id, nid(&[1, 2]));
    }

    #[test]
    fn matches_merge() {
        let mut driver = proxy(1, &[1]);
        driver.add_match(Match {
            node_id: nid(&[1]),
            offset: 4,
            len: 2,
        });
        let mut emitted = proxy(1, &[1, 1]);
        emitted.add_matches_from(&driver);
        assert_eq!(emitted.matches().len(), 1);
        assert_eq!(emitted.matches()[0].offset, 4);
    }

    #[test]
    fn closure_selectors() {
        let veto = |_: DocumentId, _: &NodeId| -> Option<NodeProxy> { None };
        assert!(veto.select(doc(1), &nid(&[1])).is_none());

        let pass = |d: DocumentId, n: &NodeId| -> Option<NodeProxy> {
            Some(NodeProxy::new(
                d,
                n.clone(),
                NameKind::Element,
                StorageAddress::new(0),
            ))
        };
        assert!(pass.select(doc(1), &nid(&[1])).is_some());
    }
}
