use thiserror::Error;

/// Primary error type for the Xylem structural index.
///
/// Structured variants for the failure modes the index can actually hit:
/// snapshot I/O, corrupt persisted state, symbol-space exhaustion and the
/// ingest-time document mismatch, which is a programming error on the caller's
/// side and is never absorbed by the index.
#[derive(Error, Debug)]
pub enum XylemError {
    // === I/O and persistence ===
    /// File or stream I/O error while reading or writing a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Short read (fewer bytes than the snapshot header promised).
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Persisted state failed validation (bad magic, version or checksum).
    #[error("corrupt snapshot: {detail}")]
    Corrupt { detail: String },

    // === Symbol table ===
    /// The 16-bit symbol space for local names or namespace URIs is full.
    #[error("symbol table overflow: no free {kind} symbols")]
    SymbolOverflow { kind: &'static str },

    // === Ingest ===
    /// A streamed node belongs to a different document than the one the
    /// worker was opened for. Fails fast; never caught inside the index.
    #[error("document mismatch: worker bound to doc {expected}, event carries doc {actual}")]
    DocumentMismatch { expected: u32, actual: u32 },

    // === Cancellation ===
    /// A scan observed a cancellation request and stopped early.
    #[error("operation terminated by caller")]
    Terminated,

    // === Internal ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl XylemError {
    /// Create a corrupt-snapshot error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is a clean cooperative-cancellation exit rather
    /// than a real failure.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Whether retrying the operation may succeed without intervention.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Terminated | Self::Io(_))
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Corrupt { .. } => {
                Some("Rebuild the index from the document store; snapshots are derived state")
            }
            Self::SymbolOverflow { .. } => {
                Some("The symbol table is append-only; reindexing into a fresh database is required")
            }
            Self::DocumentMismatch { .. } => {
                Some("Call set_document before streaming nodes of a new document")
            }
            _ => None,
        }
    }
}

/// Result type alias using `XylemError`.
pub type Result<T> = std::result::Result<T, XylemError>;
