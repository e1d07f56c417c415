//! Per-document index worker: streaming mutation and structural lookup.
//!
//! A worker is opened per thread and per document. On the write side it
//! buffers `(qname, node)` pairs streamed by the document pipeline and
//! drains them on [`IndexWorker::flush`] according to the current
//! [`IndexMode`]. On the read side it answers the three structural
//! lookups by range-scanning and point-probing the shared ordered store.
//!
//! Locking discipline: the write lock is held per `(qname, doc)` batch,
//! the read lock for a single scan or one ancestor climb. Scan hits are
//! copied out of the store before any selector runs, so user code never
//! executes under a store lock.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use xylem_error::{Result, XylemError};
use xylem_store::OrderedStore;
use xylem_types::cx::Cx;
use xylem_types::name::SymbolicName;
use xylem_types::node_id::{NodeId, Relation};
use xylem_types::{Axis, DocumentId, NameKind, QName, StorageAddress};

use crate::StructuralIndex;
use crate::keys;
use crate::listener::{IndexMode, NodeEvent, NodePath, StreamListener};
use crate::proxy::{DocumentSet, NO_CONTEXT_ID, NodeProxy, NodeSelector, NodeSet};

/// One buffered node awaiting flush.
#[derive(Debug)]
struct PendingNode {
    node_id: NodeId,
    address: StorageAddress,
    #[allow(dead_code)]
    index_hint: u16,
}

/// A raw scan hit, copied out of the store before any user code runs.
struct ScanHit {
    doc: DocumentId,
    node_id: NodeId,
    value: u64,
}

/// Per-document mutator and query engine of the structural index.
pub struct IndexWorker<S: OrderedStore> {
    index: StructuralIndex<S>,
    document: Option<DocumentId>,
    mode: IndexMode,
    // Ordered by (kind, sym, ns_sym) so flush replays deterministically in
    // key order.
    pending: BTreeMap<SymbolicName, Vec<PendingNode>>,
}

impl<S: OrderedStore> IndexWorker<S> {
    pub(crate) fn new(index: StructuralIndex<S>) -> Self {
        Self {
            index,
            document: None,
            mode: IndexMode::Unknown,
            pending: BTreeMap::new(),
        }
    }

    /// Bind the worker to a document and set the pipeline mode.
    pub fn set_document(&mut self, doc: DocumentId, mode: IndexMode) {
        self.document = Some(doc);
        self.mode = mode;
    }

    /// The currently bound document, if any.
    #[must_use]
    pub fn document(&self) -> Option<DocumentId> {
        self.document
    }

    /// The current pipeline mode.
    #[must_use]
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Change the pipeline mode without rebinding the document.
    pub fn set_mode(&mut self, mode: IndexMode) {
        self.mode = mode;
    }

    /// The stream listener the document pipeline drives.
    pub fn listener(&mut self) -> WorkerListener<'_, S> {
        WorkerListener { worker: self }
    }

    /// Reindexing always restarts from the node itself; the structural
    /// index has no path context to widen from.
    #[must_use]
    pub fn reindex_root(&self, node: NodeProxy, _path: &NodePath, _include_self: bool) -> NodeProxy {
        node
    }

    /// Buffer one streamed node under its qname.
    ///
    /// Fails fast on a document mismatch: that is a bug in the pipeline,
    /// not an index condition.
    pub fn add_node(
        &mut self,
        qname: &QName,
        doc: DocumentId,
        node_id: NodeId,
        address: StorageAddress,
        index_hint: u16,
    ) -> Result<()> {
        let current = self
            .document
            .ok_or_else(|| XylemError::internal("add_node before set_document"))?;
        if current != doc {
            return Err(XylemError::DocumentMismatch {
                expected: current.get(),
                actual: doc.get(),
            });
        }
        let name = self.index.symbols().symbolic(qname)?;
        self.pending.entry(name).or_default().push(PendingNode {
            node_id,
            address,
            index_hint,
        });
        Ok(())
    }

    /// Drain the pending buffer according to the current mode.
    ///
    /// Store and remove failures are logged and absorbed; the buffer is
    /// cleared regardless of outcome so the worker is safe for the next
    /// document.
    pub fn flush(&mut self) {
        match self.mode {
            IndexMode::Store => self.process_pending(),
            IndexMode::RemoveAllNodes => {
                if let Some(doc) = self.document {
                    self.remove_document(doc);
                } else {
                    warn!("flush in remove-all mode with no document bound");
                }
            }
            IndexMode::RemoveSomeNodes => self.remove_pending(),
            IndexMode::Unknown => {
                if !self.pending.is_empty() {
                    warn!(
                        pending = self.pending.len(),
                        "flush in unknown mode discards buffered nodes"
                    );
                }
            }
        }
        self.pending.clear();
    }

    /// Store path: insert every pending node, then ensure the doc-key.
    fn process_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let Some(doc) = self.document else {
            warn!("flush in store mode with no document bound");
            return;
        };
        debug!(doc = doc.get(), qnames = pending.len(), "flushing store batch");
        for (name, nodes) in &pending {
            // Each qname is an independent best-effort unit; the enclosing
            // transaction layer owns end-to-end atomicity.
            if let Err(err) = self.store_batch(doc, *name, nodes) {
                warn!(doc = doc.get(), name = %name, error = %err,
                    "abandoning store batch for qname");
            }
        }
    }

    fn store_batch(&self, doc: DocumentId, name: SymbolicName, nodes: &[PendingNode]) -> Result<()> {
        let mut guard = self.index.tree().write();
        for node in nodes {
            let key = keys::name_key(name, doc, &node.node_id);
            let value = keys::encode_value(node.address, node.node_id.units());
            guard.insert(&key, value)?;
        }
        let doc_key = keys::doc_key(doc, name);
        if guard.get(&doc_key)?.is_none() {
            guard.insert(&doc_key, 0)?;
        }
        drop(guard);
        self.index.metrics_ref().record_nodes_stored(nodes.len() as u64);
        Ok(())
    }

    /// Remove-some path: delete exactly the streamed nodes.
    ///
    /// Doc-keys are left alone; partial removal cannot prove that no node
    /// of the qname survives in the document.
    fn remove_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let Some(doc) = self.document else {
            warn!("flush in remove-some mode with no document bound");
            return;
        };
        for (name, nodes) in &pending {
            if let Err(err) = self.remove_batch(doc, *name, nodes) {
                warn!(doc = doc.get(), name = %name, error = %err,
                    "abandoning remove batch for qname");
            }
        }
    }

    fn remove_batch(&self, doc: DocumentId, name: SymbolicName, nodes: &[PendingNode]) -> Result<()> {
        let mut guard = self.index.tree().write();
        for node in nodes {
            let key = keys::name_key(name, doc, &node.node_id);
            guard.delete(&key)?;
        }
        drop(guard);
        self.index.metrics_ref().record_nodes_removed(nodes.len() as u64);
        Ok(())
    }

    /// Drop every index entry of a document: all its name-keys, then its
    /// doc-key inventory.
    pub fn remove_document(&mut self, doc: DocumentId) {
        let names = self.qnames_for_doc(doc);
        for name in names {
            let from = keys::name_key_prefix(name, doc.get());
            let to = keys::name_key_prefix(name, doc.successor_raw());
            let mut guard = self.index.tree().write();
            match guard.delete_range(&from, &to) {
                Ok(n) => self.index.metrics_ref().record_nodes_removed(n as u64),
                Err(err) => warn!(doc = doc.get(), name = %name, error = %err,
                    "failed to remove name-keys for qname"),
            }
        }
        let from = keys::doc_key_prefix(doc.get());
        let to = keys::doc_key_prefix(doc.successor_raw());
        let mut guard = self.index.tree().write();
        if let Err(err) = guard.delete_range(&from, &to) {
            warn!(doc = doc.get(), error = %err, "failed to remove doc-key inventory");
        }
        drop(guard);
        self.index.metrics_ref().record_document_removed();
    }

    /// Remove every document of a collection.
    pub fn remove_collection(&mut self, docs: &[DocumentId]) {
        for &doc in docs {
            self.remove_document(doc);
        }
    }

    /// Read the per-document qname inventory back from the doc-key region.
    fn qnames_for_doc(&self, doc: DocumentId) -> Vec<SymbolicName> {
        let from = keys::doc_key_prefix(doc.get());
        let to = keys::doc_key_prefix(doc.successor_raw());
        let mut names = Vec::new();
        let guard = self.index.tree().read();
        let scan = guard.range_scan(&from, &to, &mut |key, _| {
            if let Some(name) = keys::read_symbolic_name(key) {
                names.push(name);
            } else {
                warn!(doc = doc.get(), "skipping malformed doc-key");
            }
            true
        });
        if let Err(err) = scan {
            warn!(doc = doc.get(), error = %err, "failed to read doc-key inventory");
        }
        names
    }

    // -----------------------------------------------------------------
    // Structural lookups
    // -----------------------------------------------------------------

    /// Value-matching entry point; the structural index does not
    /// participate in value-level matching.
    #[must_use]
    pub fn match_elements_by_qname(
        &self,
        _kind: NameKind,
        _docs: &DocumentSet,
        _qname: &QName,
        _selector: Option<&dyn NodeSelector>,
    ) -> bool {
        false
    }

    /// Value-matching entry point; see [`Self::match_elements_by_qname`].
    #[must_use]
    pub fn match_descendants_by_qname(
        &self,
        _kind: NameKind,
        _qname: &QName,
        _axis: Axis,
        _docs: &DocumentSet,
        _context: &NodeSet,
        _context_id: i32,
    ) -> bool {
        false
    }

    /// Find all nodes of `(kind, qname)` across a document set.
    ///
    /// Adjacent docIds are coalesced into one scan, which is fast for bulk
    /// sets loaded with consecutive ids. The result is in document order.
    pub fn find_elements_by_qname(
        &self,
        kind: NameKind,
        docs: &DocumentSet,
        qname: &QName,
        selector: Option<&dyn NodeSelector>,
        cx: &Cx,
    ) -> NodeSet {
        let mut result = NodeSet::with_capacity(docs.len() * 4);
        let Some(name) = self.query_name(kind, qname) else {
            return result;
        };
        let metrics = self.index.metrics_ref();
        for (start, end) in docs.contiguous_ranges() {
            let from = keys::name_key_prefix(name, start);
            let to = keys::name_key_prefix(name, end + 1);
            let (hits, terminated) = self.scan_hits(&from, &to, cx);
            for hit in hits {
                if !docs.contains(hit.doc) {
                    continue;
                }
                let address = keys::address_from_value(hit.value);
                match selector {
                    None => result.add(NodeProxy::new(hit.doc, hit.node_id, kind, address)),
                    Some(selector) => {
                        // The key's node id and address stay authoritative;
                        // selectors contribute context, never renumbering.
                        if let Some(mut chosen) = selector.select(hit.doc, &hit.node_id) {
                            chosen.doc = hit.doc;
                            chosen.node_id = hit.node_id;
                            chosen.kind = kind;
                            chosen.address = address;
                            result.add(chosen);
                        }
                    }
                }
            }
            if terminated {
                metrics.record_scan_terminated();
                break;
            }
        }
        // Ranges ascend and each scan is in document order already.
        result.mark_in_document_order();
        result
    }

    /// Find descendants (or children, or attributes) of an ancestor set
    /// matching `(kind, qname)`.
    ///
    /// One bounded scan per ancestor: `[key(anc), key(anc.next_sibling()))`
    /// covers exactly the ancestor and its descendants. The result is not
    /// globally sorted; callers composing several ancestors sort when they
    /// need document order.
    pub fn find_descendants_by_qname(
        &self,
        kind: NameKind,
        qname: &QName,
        axis: Axis,
        docs: &DocumentSet,
        ancestors: &NodeSet,
        context_id: i32,
        cx: &Cx,
    ) -> NodeSet {
        let mut result = NodeSet::with_capacity(docs.len() * 4);
        let Some(name) = self.query_name(kind, qname) else {
            return result;
        };
        let metrics = self.index.metrics_ref();
        for ancestor in ancestors {
            let (from, to) = if ancestor.node_id.is_document_node() {
                (
                    keys::name_key_prefix(name, ancestor.doc.get()).to_vec(),
                    keys::name_key_prefix(name, ancestor.doc.successor_raw()).to_vec(),
                )
            } else {
                let Some(bound) = ancestor.node_id.next_sibling() else {
                    continue;
                };
                (
                    keys::name_key(name, ancestor.doc, &ancestor.node_id),
                    keys::name_key(name, ancestor.doc, &bound),
                )
            };
            let (hits, terminated) = self.scan_hits(&from, &to, cx);
            for hit in hits {
                let accepted = match axis {
                    Axis::DescendantOrSelf | Axis::DescendantAttribute => true,
                    Axis::Child | Axis::Attribute => {
                        hit.node_id.compute_relation(&ancestor.node_id) == Relation::IsChild
                    }
                    Axis::Descendant => matches!(
                        hit.node_id.compute_relation(&ancestor.node_id),
                        Relation::IsChild | Relation::IsDescendant
                    ),
                    _ => false,
                };
                if !accepted {
                    continue;
                }
                let address = keys::address_from_value(hit.value);
                let mut proxy = NodeProxy::new(ancestor.doc, hit.node_id, kind, address);
                if context_id == NO_CONTEXT_ID {
                    proxy.copy_context_from(ancestor);
                } else {
                    proxy.deep_copy_context_from(ancestor, context_id);
                }
                proxy.add_matches_from(ancestor);
                result.add(proxy);
            }
            if terminated {
                metrics.record_scan_terminated();
                break;
            }
        }
        result
    }

    /// Find ancestors (or self, or parent) of a descendant set matching
    /// `(kind, qname)`.
    ///
    /// Ancestor chains are short, so this probes one exact key per level
    /// instead of scanning. The result is sorted into document order.
    pub fn find_ancestors_by_qname(
        &self,
        kind: NameKind,
        qname: &QName,
        axis: Axis,
        docs: &DocumentSet,
        descendants: &NodeSet,
        context_id: i32,
        cx: &Cx,
    ) -> NodeSet {
        let mut result = NodeSet::with_capacity(docs.len() * 4);
        let Some(name) = self.query_name(kind, qname) else {
            return result;
        };
        let metrics = self.index.metrics_ref();
        let mut terminated = false;
        for descendant in descendants {
            let mut chain: Vec<(NodeId, u64)> = Vec::new();
            let mut current = if axis.seeds_self() {
                descendant.node_id.clone()
            } else {
                descendant.node_id.parent_id()
            };
            {
                let guard = self.index.tree().read();
                while !current.is_document_node() {
                    if cx.checkpoint().is_err() {
                        terminated = true;
                        break;
                    }
                    let key = keys::name_key(name, descendant.doc, &current);
                    metrics.record_point_lookup();
                    match guard.get(&key) {
                        Ok(Some(value)) => chain.push((current.clone(), value)),
                        Ok(None) => {}
                        Err(err) => {
                            warn!(doc = descendant.doc.get(), error = %err,
                                "abandoning ancestor climb");
                            break;
                        }
                    }
                    if axis.single_step() {
                        break;
                    }
                    current = current.parent_id();
                }
            }
            for (node_id, value) in chain {
                let address = keys::address_from_value(value);
                let mut proxy = NodeProxy::new(descendant.doc, node_id, kind, address);
                if context_id == NO_CONTEXT_ID {
                    proxy.copy_context_from(descendant);
                } else {
                    proxy.deep_copy_context_from(descendant, context_id);
                }
                proxy.add_matches_from(descendant);
                result.add(proxy);
            }
            if terminated {
                metrics.record_scan_terminated();
                break;
            }
        }
        result.sort();
        result
    }

    /// Resolve the interned query name, logging and returning `None` on
    /// symbol exhaustion (a name that cannot be interned has never been
    /// indexed).
    fn query_name(&self, kind: NameKind, qname: &QName) -> Option<SymbolicName> {
        match self
            .index
            .symbols()
            .symbolic_parts(kind, &qname.local, &qname.ns_uri)
        {
            Ok(name) => Some(name),
            Err(err) => {
                warn!(qname = %qname, error = %err, "cannot intern query name");
                None
            }
        }
    }

    /// Run one range scan under the read lock, copying hits out before any
    /// caller-supplied code runs. Returns the hits and whether the scan was
    /// terminated by the cancellation token.
    fn scan_hits(&self, from: &[u8], to: &[u8], cx: &Cx) -> (Vec<ScanHit>, bool) {
        let metrics = self.index.metrics_ref();
        metrics.record_scan_started();
        let mut hits = Vec::new();
        let mut terminated = false;
        let guard = self.index.tree().read();
        let scan = guard.range_scan(from, to, &mut |key, value| {
            if cx.checkpoint().is_err() {
                terminated = true;
                return false;
            }
            metrics.record_scan_row();
            let (Some(doc), Some(node_id)) = (keys::read_doc_id(key), keys::read_node_id(key, value))
            else {
                warn!("skipping malformed name-key");
                return true;
            };
            hits.push(ScanHit {
                doc,
                node_id,
                value,
            });
            true
        });
        drop(guard);
        if let Err(err) = scan {
            warn!(error = %err, "scan failed; returning partial result");
        }
        (hits, terminated)
    }
}

/// Adapter the document pipeline drives; forwards element and attribute
/// events into the owning worker's pending buffer.
pub struct WorkerListener<'a, S: OrderedStore> {
    worker: &'a mut IndexWorker<S>,
}

impl<S: OrderedStore> StreamListener for WorkerListener<'_, S> {
    fn start_element(&mut self, event: NodeEvent<'_>, _path: &NodePath) -> Result<()> {
        if matches!(
            self.worker.mode,
            IndexMode::Store | IndexMode::RemoveSomeNodes
        ) {
            self.worker.add_node(
                event.qname,
                event.doc,
                event.node_id,
                event.address,
                event.index_hint,
            )?;
        }
        Ok(())
    }

    fn attribute(&mut self, event: NodeEvent<'_>, _path: &NodePath) -> Result<()> {
        if matches!(
            self.worker.mode,
            IndexMode::Store | IndexMode::RemoveSomeNodes
        ) {
            self.worker.add_node(
                event.qname,
                event.doc,
                event.node_id,
                event.address,
                event.index_hint,
            )?;
        }
        Ok(())
    }
}
