use domain::common::error::DomainError;
use domain::conntrack::entity::ConnectionRecord;

/// Secondary port yielding tracked connections.
///
/// Implemented by whatever adapter reads the connection table. Records are
/// returned in the order the source produces them; callers must not rely on
/// any particular ordering.
pub trait ConnTrackSourcePort: Send + Sync {
    /// Retrieve up to `limit` tracked connections.
    fn get_connections(&self, limit: usize) -> Result<Vec<ConnectionRecord>, DomainError>;

    /// Current number of tracked connections.
    fn connection_count(&self) -> Result<u64, DomainError>;
}
