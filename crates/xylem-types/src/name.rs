//! Qualified names and their interned, fixed-width form.

use std::fmt;

use crate::Symbol;

/// Distinguishes element names from attribute names.
///
/// The byte values double as the leading key-region tag of the structural
/// index's name-keys, so they must stay below the doc-key tag (`0x02`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(u8)]
pub enum NameKind {
    Element = 0x00,
    Attribute = 0x01,
}

impl NameKind {
    /// The wire byte for this kind.
    #[inline]
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Decode a wire byte.
    #[inline]
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Element),
            0x01 => Some(Self::Attribute),
            _ => None,
        }
    }
}

/// A qualified name: local name, namespace URI and name kind.
///
/// Equality is on all three fields. The empty string is the "no namespace"
/// URI and interns to [`Symbol::NONE`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub local: String,
    pub ns_uri: String,
    pub kind: NameKind,
}

impl QName {
    /// An element name in the given namespace (`""` for no namespace).
    pub fn element(local: impl Into<String>, ns_uri: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            ns_uri: ns_uri.into(),
            kind: NameKind::Element,
        }
    }

    /// An attribute name in the given namespace (`""` for no namespace).
    pub fn attribute(local: impl Into<String>, ns_uri: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            ns_uri: ns_uri.into(),
            kind: NameKind::Attribute,
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ns_uri.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.ns_uri, self.local)
        }
    }
}

/// The interned form of a [`QName`]: kind plus two 16-bit symbols.
///
/// The derived ordering is `(kind, sym, ns_sym)`, which is exactly the
/// order name-key bytes sort in, so a map keyed by `SymbolicName` replays
/// pending batches in index order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct SymbolicName {
    pub kind: NameKind,
    pub sym: Symbol,
    pub ns_sym: Symbol,
}

impl SymbolicName {
    /// Construct from parts.
    #[must_use]
    pub const fn new(kind: NameKind, sym: Symbol, ns_sym: Symbol) -> Self {
        Self { kind, sym, ns_sym }
    }
}

impl fmt::Display for SymbolicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            NameKind::Element => "elem",
            NameKind::Attribute => "attr",
        };
        write!(f, "{tag}({},{})", self.sym.get(), self.ns_sym.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_bytes_stay_below_doc_key_tag() {
        assert_eq!(NameKind::Element.as_byte(), 0x00);
        assert_eq!(NameKind::Attribute.as_byte(), 0x01);
        assert!(NameKind::Element.as_byte() < 0x02);
        assert!(NameKind::Attribute.as_byte() < 0x02);
    }

    #[test]
    fn kind_round_trip() {
        assert_eq!(NameKind::from_byte(0x00), Some(NameKind::Element));
        assert_eq!(NameKind::from_byte(0x01), Some(NameKind::Attribute));
        assert_eq!(NameKind::from_byte(0x02), None);
        assert_eq!(NameKind::from_byte(0xFF), None);
    }

    #[test]
    fn qname_equality_includes_kind() {
        let elem = QName::element("title", "");
        let attr = QName::attribute("title", "");
        assert_ne!(elem, attr);
        assert_eq!(elem, QName::element("title", ""));
    }

    #[test]
    fn qname_display() {
        assert_eq!(QName::element("book", "").to_string(), "book");
        assert_eq!(
            QName::element("book", "urn:example").to_string(),
            "{urn:example}book"
        );
    }

    #[test]
    fn symbolic_name_orders_like_key_bytes() {
        let a = SymbolicName::new(NameKind::Element, Symbol::from_raw(5), Symbol::from_raw(9));
        let b = SymbolicName::new(NameKind::Element, Symbol::from_raw(6), Symbol::from_raw(0));
        let c = SymbolicName::new(NameKind::Attribute, Symbol::from_raw(1), Symbol::from_raw(0));
        // kind dominates, then sym, then ns_sym.
        assert!(a < b);
        assert!(b < c);

        let d = SymbolicName::new(NameKind::Element, Symbol::from_raw(5), Symbol::from_raw(10));
        assert!(a < d);
    }
}
