//! Stream-listener contract between the document pipeline and the index.
//!
//! The pipeline shreds a document into events and drives every index's
//! listener with them. The structural index only cares about
//! `start_element` and `attribute`; element paths are carried for the
//! benefit of path-based indexes and ignored here.

use xylem_error::Result;
use xylem_types::node_id::NodeId;
use xylem_types::{DocumentId, QName, StorageAddress};

/// Hint value meaning "no range-index configured for this node".
///
/// The structural index stores the hint with each pending node but never
/// interprets it.
pub const NO_INDEX_HINT: u16 = 0;

/// What the pipeline is currently doing with the worker's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    #[default]
    Unknown,
    /// Streamed nodes are inserted on flush.
    Store,
    /// Flush drops every index entry of the document.
    RemoveAllNodes,
    /// Streamed nodes are deleted on flush; doc-keys stay.
    RemoveSomeNodes,
}

/// The element path from the document root to the current event.
#[derive(Debug, Default, Clone)]
pub struct NodePath {
    components: Vec<QName>,
}

impl NodePath {
    /// An empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a step when entering an element.
    pub fn push(&mut self, qname: QName) {
        self.components.push(qname);
    }

    /// Pop a step when leaving an element.
    pub fn pop(&mut self) -> Option<QName> {
        self.components.pop()
    }

    /// The steps from the root to the current position.
    #[must_use]
    pub fn components(&self) -> &[QName] {
        &self.components
    }

    /// Path depth.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the path is at the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// One element or attribute event.
#[derive(Debug)]
pub struct NodeEvent<'a> {
    /// The node's qualified name.
    pub qname: &'a QName,
    /// The document the node belongs to.
    pub doc: DocumentId,
    /// The node's Dewey id.
    pub node_id: NodeId,
    /// Handle to the serialized node in the document store.
    pub address: StorageAddress,
    /// Opaque range-index hint ([`NO_INDEX_HINT`] when absent).
    pub index_hint: u16,
}

/// Receiver of document-pipeline events.
///
/// The default implementations make every callback a no-op so listeners
/// implement only what they observe.
pub trait StreamListener {
    /// A document begins.
    fn start_document(&mut self, doc: DocumentId) -> Result<()> {
        let _ = doc;
        Ok(())
    }

    /// An element starts.
    fn start_element(&mut self, event: NodeEvent<'_>, path: &NodePath) -> Result<()>;

    /// An attribute of the current element.
    fn attribute(&mut self, event: NodeEvent<'_>, path: &NodePath) -> Result<()>;

    /// An element ends.
    fn end_element(&mut self, qname: &QName, path: &NodePath) -> Result<()> {
        let _ = (qname, path);
        Ok(())
    }

    /// The document ends.
    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_path_push_pop() {
        let mut path = NodePath::new();
        assert!(path.is_empty());
        path.push(QName::element("a", ""));
        path.push(QName::element("b", ""));
        assert_eq!(path.len(), 2);
        assert_eq!(path.pop().unwrap().local, "b");
        assert_eq!(path.components().len(), 1);
    }

    #[test]
    fn default_mode_is_unknown() {
        assert_eq!(IndexMode::default(), IndexMode::Unknown);
    }
}
