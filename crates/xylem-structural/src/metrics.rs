//! Lightweight operational counters for the structural index.
//!
//! Counting uses relaxed atomics and is always on; reading a snapshot is
//! lock-free. Observation never blocks writers or readers of the store.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters maintained by the index across all its workers.
#[derive(Debug, Default)]
pub struct IndexMetrics {
    nodes_stored: AtomicU64,
    nodes_removed: AtomicU64,
    documents_removed: AtomicU64,
    scans_started: AtomicU64,
    scan_rows_visited: AtomicU64,
    scans_terminated: AtomicU64,
    point_lookups: AtomicU64,
}

impl IndexMetrics {
    pub(crate) fn record_nodes_stored(&self, n: u64) {
        self.nodes_stored.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_nodes_removed(&self, n: u64) {
        self.nodes_removed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_document_removed(&self) {
        self.documents_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan_started(&self) {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan_row(&self) {
        self.scan_rows_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan_terminated(&self) {
        self.scans_terminated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_point_lookup(&self) {
        self.point_lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> IndexMetricsSnapshot {
        IndexMetricsSnapshot {
            nodes_stored: self.nodes_stored.load(Ordering::Relaxed),
            nodes_removed: self.nodes_removed.load(Ordering::Relaxed),
            documents_removed: self.documents_removed.load(Ordering::Relaxed),
            scans_started: self.scans_started.load(Ordering::Relaxed),
            scan_rows_visited: self.scan_rows_visited.load(Ordering::Relaxed),
            scans_terminated: self.scans_terminated.load(Ordering::Relaxed),
            point_lookups: self.point_lookups.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero (tests/diagnostics).
    pub fn reset(&self) {
        self.nodes_stored.store(0, Ordering::Relaxed);
        self.nodes_removed.store(0, Ordering::Relaxed);
        self.documents_removed.store(0, Ordering::Relaxed);
        self.scans_started.store(0, Ordering::Relaxed);
        self.scan_rows_visited.store(0, Ordering::Relaxed);
        self.scans_terminated.store(0, Ordering::Relaxed);
        self.point_lookups.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of [`IndexMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexMetricsSnapshot {
    pub nodes_stored: u64,
    pub nodes_removed: u64,
    pub documents_removed: u64,
    pub scans_started: u64,
    pub scan_rows_visited: u64,
    pub scans_terminated: u64,
    pub point_lookups: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let metrics = IndexMetrics::default();
        metrics.record_nodes_stored(3);
        metrics.record_scan_started();
        metrics.record_scan_row();
        metrics.record_scan_row();
        metrics.record_point_lookup();

        let snap = metrics.snapshot();
        assert_eq!(snap.nodes_stored, 3);
        assert_eq!(snap.scans_started, 1);
        assert_eq!(snap.scan_rows_visited, 2);
        assert_eq!(snap.point_lookups, 1);
        assert_eq!(snap.nodes_removed, 0);

        metrics.reset();
        assert_eq!(metrics.snapshot().nodes_stored, 0);
    }

    #[test]
    fn snapshot_serializes() {
        let metrics = IndexMetrics::default();
        metrics.record_document_removed();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["documents_removed"], 1);
        assert_eq!(json["scans_terminated"], 0);
    }
}
