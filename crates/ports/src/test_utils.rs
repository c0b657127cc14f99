use domain::common::error::DomainError;
use domain::conntrack::entity::ConnectionRecord;

use crate::secondary::conntrack_source_port::ConnTrackSourcePort;
use crate::secondary::metrics_port::ConnTrackMetrics;

/// No-op metrics for use in tests.
pub struct NoopMetrics;

impl ConnTrackMetrics for NoopMetrics {}

/// Fixed in-memory connection source for tests.
#[derive(Default)]
pub struct InMemoryConnTrackSource {
    records: Vec<ConnectionRecord>,
    fail: bool,
}

impl InMemoryConnTrackSource {
    pub fn new(records: Vec<ConnectionRecord>) -> Self {
        Self {
            records,
            fail: false,
        }
    }

    /// A source whose every read fails with `DomainError::SourceError`.
    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            fail: true,
        }
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.fail {
            return Err(DomainError::SourceError("source unavailable".to_string()));
        }
        Ok(())
    }
}

impl ConnTrackSourcePort for InMemoryConnTrackSource {
    fn get_connections(&self, limit: usize) -> Result<Vec<ConnectionRecord>, DomainError> {
        self.check()?;
        Ok(self.records.iter().take(limit).cloned().collect())
    }

    fn connection_count(&self) -> Result<u64, DomainError> {
        self.check()?;
        Ok(self.records.len() as u64)
    }
}
