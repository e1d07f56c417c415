//! Core value types shared across the Xylem structural index.
//!
//! This crate defines the identity primitives the index is built from:
//! [`DocumentId`] and [`StorageAddress`] (handles issued by the document
//! store), [`Symbol`] (interned name identifiers), the qualified-name types
//! in [`name`], the Dewey [`NodeId`](node_id::NodeId) in [`node_id`], the
//! XPath [`Axis`] constants, and the cooperative-cancellation context in
//! [`cx`].

pub mod cx;
pub mod name;
pub mod node_id;

pub use cx::Cx;
pub use name::{NameKind, QName, SymbolicName};
pub use node_id::{NodeId, Relation};

use std::fmt;
use std::num::NonZeroU32;

/// Identifier of a document in the document store.
///
/// Document ids are positive 32-bit integers. The domain is capped at
/// `u32::MAX - 1` so that `id + 1` always exists and can serve as the
/// exclusive upper bound of an index range scan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct DocumentId(NonZeroU32);

impl DocumentId {
    /// Maximum raw value representable by a document id.
    pub const MAX_RAW: u32 = u32::MAX - 1;

    /// Construct a `DocumentId` if `raw` is in-domain.
    #[inline]
    pub const fn new(raw: u32) -> Option<Self> {
        if raw > Self::MAX_RAW {
            return None;
        }
        match NonZeroU32::new(raw) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Get the raw u32 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// The raw value one past this id, always in `u32` range.
    ///
    /// This is the value range scans use as their exclusive docId bound.
    #[inline]
    #[must_use]
    pub const fn successor_raw(self) -> u32 {
        self.0.get() + 1
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.get())
    }
}

/// Opaque 64-bit handle to a serialized node record in the document store.
///
/// Only the low 56 bits are meaningful; the top byte is reserved, and the
/// byte at bits 24–31 is left zero by the document store so the structural
/// index can piggyback node-id bit counts there (see the key codec).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct StorageAddress(u64);

impl StorageAddress {
    /// Mask selecting the bits a storage address may occupy.
    pub const ADDRESS_MASK: u64 = 0x00FF_FFFF_00FF_FFFF;

    /// Construct from a raw handle, masking reserved bits.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw & Self::ADDRESS_MASK)
    }

    /// Get the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr:{:#x}", self.0)
    }
}

/// A 16-bit interned identifier for a local name or a namespace URI.
///
/// Symbol `0` is reserved: for namespaces it denotes the empty namespace
/// URI, for local names it is never assigned. Real symbols are handed out
/// monotonically from 1 and are never reassigned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct Symbol(u16);

impl Symbol {
    /// The reserved symbol (empty namespace / never a local name).
    pub const NONE: Self = Self(0);

    /// Construct from a raw u16.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Get the raw u16 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym#{}", self.0)
    }
}

/// XPath axes the structural index can be asked to resolve.
///
/// Only a subset affects branching inside the index: the descendant lookups
/// distinguish `Child`/`Attribute` from `Descendant` from the
/// accept-everything pair `DescendantOrSelf`/`DescendantAttribute`, and the
/// ancestor lookups distinguish the self-seeded and single-step axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    SelfNode,
    Parent,
    Child,
    Attribute,
    Descendant,
    DescendantOrSelf,
    DescendantAttribute,
    Ancestor,
    AncestorOrSelf,
}

impl Axis {
    /// Whether an ancestor lookup on this axis starts at the context node
    /// itself rather than at its parent.
    #[must_use]
    pub const fn seeds_self(self) -> bool {
        matches!(self, Self::SelfNode | Self::AncestorOrSelf)
    }

    /// Whether an ancestor lookup on this axis stops after one step.
    #[must_use]
    pub const fn single_step(self) -> bool {
        matches!(self, Self::SelfNode | Self::Parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_domain() {
        assert!(DocumentId::new(0).is_none());
        assert!(DocumentId::new(u32::MAX).is_none());
        let id = DocumentId::new(DocumentId::MAX_RAW).unwrap();
        assert_eq!(id.successor_raw(), u32::MAX);
    }

    #[test]
    fn document_id_display() {
        let id = DocumentId::new(42).unwrap();
        assert_eq!(id.to_string(), "doc#42");
    }

    #[test]
    fn storage_address_masks_reserved_bits() {
        let addr = StorageAddress::new(0xFFFF_FFFF_FFFF_FFFF);
        assert_eq!(addr.get(), StorageAddress::ADDRESS_MASK);

        // Bits 24-31 are reserved for the index's piggyback field.
        let addr = StorageAddress::new(0x0300_0100);
        assert_eq!(addr.get(), 0x100);
    }

    #[test]
    fn symbol_reserved_zero() {
        assert_eq!(Symbol::NONE.get(), 0);
        assert!(Symbol::from_raw(1) > Symbol::NONE);
    }

    #[test]
    fn axis_ancestor_branching() {
        assert!(Axis::SelfNode.seeds_self());
        assert!(Axis::AncestorOrSelf.seeds_self());
        assert!(!Axis::Ancestor.seeds_self());
        assert!(!Axis::Parent.seeds_self());

        assert!(Axis::SelfNode.single_step());
        assert!(Axis::Parent.single_step());
        assert!(!Axis::Ancestor.single_step());
        assert!(!Axis::AncestorOrSelf.single_step());
    }
}
