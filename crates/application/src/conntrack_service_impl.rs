use std::sync::Arc;

use domain::common::error::DomainError;
use domain::conntrack::dedup::{DedupSettings, EventDeduplicator};
use domain::conntrack::entity::ConnectionRecord;
use domain::conntrack::flags::ComparisonFlags;
use ports::secondary::conntrack_source_port::ConnTrackSourcePort;
use ports::secondary::metrics_port::ConnTrackMetrics;

/// Application-level conntrack service.
///
/// Filters the connection table against pattern records and deduplicates
/// incoming connection events. Designed to be wrapped in `RwLock` for shared
/// access.
pub struct ConnTrackAppService {
    filter_flags: ComparisonFlags,
    dedup: EventDeduplicator,
    source: Option<Box<dyn ConnTrackSourcePort>>,
    metrics: Arc<dyn ConnTrackMetrics>,
}

impl ConnTrackAppService {
    pub fn new(metrics: Arc<dyn ConnTrackMetrics>) -> Self {
        Self {
            filter_flags: ComparisonFlags::ALL | ComparisonFlags::MASK,
            dedup: EventDeduplicator::default(),
            source: None,
            metrics,
        }
    }

    /// Set the port the connection table is read from.
    pub fn set_source_port(&mut self, port: Box<dyn ConnTrackSourcePort>) {
        self.source = Some(port);
    }

    /// Flags used by [`filter`](Self::filter).
    pub fn filter_flags(&self) -> ComparisonFlags {
        self.filter_flags
    }

    pub fn dedup_settings(&self) -> &DedupSettings {
        self.dedup.settings()
    }

    /// Replace filter flags and dedup settings. Remembered events survive
    /// unless dedup gets disabled.
    pub fn reload_settings(
        &mut self,
        filter_flags: ComparisonFlags,
        dedup: DedupSettings,
    ) -> Result<(), DomainError> {
        if dedup.enabled && (dedup.max_entries == 0 || dedup.window.is_zero()) {
            return Err(DomainError::InvalidConfig(
                "dedup window and max_entries must be non-zero".to_string(),
            ));
        }

        self.filter_flags = filter_flags;
        self.dedup.reload(dedup);
        self.metrics.set_dedup_entries(self.dedup.len() as u64);
        tracing::info!(
            flags = ?filter_flags,
            dedup_enabled = dedup.enabled,
            window_secs = dedup.window.as_secs(),
            max_entries = dedup.max_entries,
            "conntrack settings reloaded"
        );
        Ok(())
    }

    /// Records from the source matching `pattern` under `flags`, up to
    /// `limit` matches. `pattern` is the first operand of every comparison.
    pub fn query(
        &self,
        pattern: &ConnectionRecord,
        flags: ComparisonFlags,
        limit: usize,
    ) -> Result<Vec<ConnectionRecord>, DomainError> {
        let records = self.read_all()?;
        let scanned = records.len();

        let matched: Vec<ConnectionRecord> = records
            .into_iter()
            .filter(|r| pattern.matches(r, flags))
            .take(limit)
            .collect();

        self.metrics
            .record_query(scanned as u64, matched.len() as u64);
        tracing::debug!(
            scanned,
            matched = matched.len(),
            flags = ?flags,
            "conntrack query"
        );
        Ok(matched)
    }

    /// [`query`](Self::query) with the configured filter flags.
    pub fn filter(
        &self,
        pattern: &ConnectionRecord,
        limit: usize,
    ) -> Result<Vec<ConnectionRecord>, DomainError> {
        self.query(pattern, self.filter_flags, limit)
    }

    /// Number of source records matching `pattern` under `flags`.
    pub fn count_matching(
        &self,
        pattern: &ConnectionRecord,
        flags: ComparisonFlags,
    ) -> Result<u64, DomainError> {
        let records = self.read_all()?;
        let count = records.iter().filter(|r| pattern.matches(r, flags)).count();
        Ok(count as u64)
    }

    /// Pass an observed connection event through the deduplicator. Returns
    /// `true` when the event should be forwarded.
    pub fn ingest_event(&mut self, record: &ConnectionRecord) -> bool {
        let forwarded = self.dedup.observe(record);
        let outcome = if forwarded { "forwarded" } else { "suppressed" };

        self.metrics.record_event(outcome);
        self.metrics.set_dedup_entries(self.dedup.len() as u64);
        tracing::debug!(outcome, remembered = self.dedup.len(), "conntrack event");
        forwarded
    }

    /// Current number of tracked connections at the source.
    pub fn connection_count(&self) -> Result<u64, DomainError> {
        match self.source {
            Some(ref port) => port.connection_count(),
            None => Ok(0),
        }
    }

    fn read_all(&self) -> Result<Vec<ConnectionRecord>, DomainError> {
        let Some(ref port) = self.source else {
            return Ok(Vec::new());
        };

        port.get_connections(usize::MAX).inspect_err(|e| {
            self.metrics.record_source_error();
            tracing::warn!("failed to read connection table: {e}");
        })
    }
}
