use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid connection record: {0}")]
    InvalidRecord(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("source error: {0}")]
    SourceError(String),
}
