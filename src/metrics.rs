use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing query and indexing activity.
#[derive(Default)]
pub struct QaMetrics {
    queries_answered: AtomicU64,
    model_failures: AtomicU64,
    index_builds: AtomicU64,
    indexed_files: AtomicU64,
    indexed_chunks: AtomicU64,
}

impl QaMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query the language model answered.
    pub fn record_query(&self) {
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed call to the language model.
    pub fn record_model_failure(&self) {
        self.model_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed rebuild.
    pub fn record_build(&self) {
        self.index_builds.fetch_add(1, Ordering::Relaxed);
    }

    /// Describe the index currently being served.
    pub fn set_index_size(&self, files: u64, chunks: u64) {
        self.indexed_files.store(files, Ordering::Relaxed);
        self.indexed_chunks.store(chunks, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            model_failures: self.model_failures.load(Ordering::Relaxed),
            index_builds: self.index_builds.load(Ordering::Relaxed),
            indexed_files: self.indexed_files.load(Ordering::Relaxed),
            indexed_chunks: self.indexed_chunks.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Queries the language model answered since startup.
    pub queries_answered: u64,
    /// Language model calls that failed since startup.
    pub model_failures: u64,
    /// Successful index builds since startup.
    pub index_builds: u64,
    /// Files in the index currently served.
    pub indexed_files: u64,
    /// Chunks in the index currently served.
    pub indexed_chunks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_queries_and_builds() {
        let metrics = QaMetrics::new();
        metrics.record_query();
        metrics.record_query();
        metrics.record_model_failure();
        metrics.record_build();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queries_answered, 2);
        assert_eq!(snapshot.model_failures, 1);
        assert_eq!(snapshot.index_builds, 1);
    }

    #[test]
    fn index_size_is_replaced_not_accumulated() {
        let metrics = QaMetrics::new();
        metrics.set_index_size(3, 40);
        metrics.set_index_size(1, 7);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.indexed_files, 1);
        assert_eq!(snapshot.indexed_chunks, 7);
    }

    #[test]
    fn fresh_snapshot_is_zeroed() {
        assert_eq!(QaMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
