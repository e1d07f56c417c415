//! Cooperative-cancellation context.
//!
//! Long-running range scans poll [`Cx::checkpoint`] between visited entries;
//! a requested cancellation makes the scan abort cleanly and the caller
//! treats whatever accumulated as a partial result. Write batches do not
//! poll: they are short and must complete to keep the index invariants.

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reason for cancellation, ordered from weakest to strongest.
///
/// Multiple cancel requests are monotone: the strongest reason wins and the
/// recorded reason can never get weaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CancelReason {
    Timeout = 0,
    UserInterrupt = 1,
    Shutdown = 2,
}

/// Error returned by [`Cx::checkpoint`] once cancellation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

#[derive(Debug)]
struct CxInner {
    cancel_requested: AtomicBool,
    cancel_reason: Mutex<Option<CancelReason>>,
}

/// Shared cancellation token.
///
/// Clones share state: cancelling any clone is observed by all of them.
#[derive(Debug, Clone)]
pub struct Cx {
    inner: Arc<CxInner>,
}

impl Default for Cx {
    fn default() -> Self {
        Self::new()
    }
}

impl Cx {
    /// A fresh, not-cancelled context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CxInner {
                cancel_requested: AtomicBool::new(false),
                cancel_reason: Mutex::new(None),
            }),
        }
    }

    /// Request cancellation with the default reason (`UserInterrupt`).
    pub fn cancel(&self) {
        self.cancel_with_reason(CancelReason::UserInterrupt);
    }

    /// Request cancellation with an explicit reason.
    ///
    /// The strongest reason wins; weaker reasons are ignored once a
    /// stronger one has been set.
    pub fn cancel_with_reason(&self, reason: CancelReason) {
        self.inner.cancel_requested.store(true, Ordering::Release);
        let mut slot = self
            .inner
            .cancel_reason
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match *slot {
            Some(existing) if existing >= reason => {}
            _ => *slot = Some(reason),
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    /// The strongest cancellation reason set so far, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        *self
            .inner
            .cancel_reason
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Check for cancellation at a yield point.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.inner.cancel_requested.load(Ordering::Acquire) {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_observes_cancellation() {
        let cx = Cx::new();
        assert!(cx.checkpoint().is_ok());
        cx.cancel();
        assert_eq!(cx.checkpoint(), Err(Cancelled));
    }

    #[test]
    fn cancel_shared_across_clones() {
        let cx1 = Cx::new();
        let cx2 = cx1.clone();
        assert!(!cx2.is_cancel_requested());
        cx1.cancel();
        assert!(cx2.is_cancel_requested());
        assert!(cx2.checkpoint().is_err());
    }

    #[test]
    fn strongest_reason_wins() {
        let cx = Cx::new();
        cx.cancel_with_reason(CancelReason::Timeout);
        assert_eq!(cx.cancel_reason(), Some(CancelReason::Timeout));

        cx.cancel_with_reason(CancelReason::Shutdown);
        assert_eq!(cx.cancel_reason(), Some(CancelReason::Shutdown));

        // Weaker reason does not downgrade.
        cx.cancel_with_reason(CancelReason::UserInterrupt);
        assert_eq!(cx.cancel_reason(), Some(CancelReason::Shutdown));
    }

    #[test]
    fn fresh_context_has_no_reason() {
        let cx = Cx::new();
        assert_eq!(cx.cancel_reason(), None);
    }
}
