//! Structural index of the Xylem XML database.
//!
//! One ordered store holds every entry, keyed as
//! `[type, qname symbols, docId, nodeId]` with the value pointing at the
//! node's record in the document store. Child, descendant and ancestor
//! queries become range scans and point lookups because serialized node
//! ids sort in document order and descendants fall inside
//! `[key(A), key(A.next_sibling()))`.
//!
//! [`StructuralIndex`] owns the store, the injected [`SymbolTable`] and
//! the metrics; [`worker::IndexWorker`] does all the actual reading and
//! writing, one worker per thread and document.

use std::sync::Arc;

use xylem_store::{MemTree, OrderedStore, SharedTree};

pub mod keys;
pub mod listener;
pub mod metrics;
pub mod proxy;
pub mod symbols;
pub mod worker;

pub use listener::{IndexMode, NO_INDEX_HINT, NodeEvent, NodePath, StreamListener};
pub use metrics::{IndexMetrics, IndexMetricsSnapshot};
pub use proxy::{
    ContextEdge, DocumentSet, Match, NO_CONTEXT_ID, NodeProxy, NodeSelector, NodeSet,
};
pub use symbols::SymbolTable;
pub use worker::{IndexWorker, WorkerListener};

struct IndexShared<S> {
    tree: SharedTree<S>,
    symbols: Arc<SymbolTable>,
    metrics: metrics::IndexMetrics,
}

/// Top-level owner of the structural index.
///
/// Cheap to clone; all clones share the store, the symbol table and the
/// metrics. Lifecycle is bound to the enclosing broker pool.
pub struct StructuralIndex<S: OrderedStore = MemTree> {
    inner: Arc<IndexShared<S>>,
}

impl<S: OrderedStore> Clone for StructuralIndex<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: OrderedStore> StructuralIndex<S> {
    /// Create an index over `store` with an injected symbol table.
    ///
    /// The symbol table is shared with the host, which persists it; keys
    /// embed its symbols, so it must be the same table across restarts.
    pub fn new(store: S, symbols: Arc<SymbolTable>) -> Self {
        Self {
            inner: Arc::new(IndexShared {
                tree: SharedTree::new(store),
                symbols,
                metrics: metrics::IndexMetrics::default(),
            }),
        }
    }

    /// Open a fresh worker.
    #[must_use]
    pub fn worker(&self) -> worker::IndexWorker<S> {
        worker::IndexWorker::new(self.clone())
    }

    /// The shared symbol table.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.inner.symbols
    }

    /// The locked store. Hosts use this for persistence; queries and
    /// flushes go through workers.
    #[must_use]
    pub fn tree(&self) -> &SharedTree<S> {
        &self.inner.tree
    }

    /// Snapshot of the operational counters.
    #[must_use]
    pub fn metrics(&self) -> IndexMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub(crate) fn metrics_ref(&self) -> &metrics::IndexMetrics {
        &self.inner.metrics
    }
}

impl Default for StructuralIndex<MemTree> {
    fn default() -> Self {
        Self::new(MemTree::new(), Arc::new(SymbolTable::new()))
    }
}
