// Metric hooks for the conntrack services.
//
// Methods take `&self` and default to no-ops so an implementation only
// overrides what it exports.

pub trait ConnTrackMetrics: Send + Sync {
    /// Record a filter query with the number of records scanned and matched.
    fn record_query(&self, _scanned: u64, _matched: u64) {}

    /// Record an event outcome from the deduplicator (`forwarded`/`suppressed`).
    fn record_event(&self, _outcome: &str) {}

    /// Set the number of records currently held by the deduplicator.
    fn set_dedup_entries(&self, _count: u64) {}

    /// Record a failed read from the connection source.
    fn record_source_error(&self) {}
}
