use thiserror::Error;

/// Storage-side failures: reading/writing log rows and taking the dispatch lock.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure classes reported by the vulnerability database.
///
/// `NotFound` and `Forbidden` are the recognizable signals the event parser
/// may absorb when a replayed call finds the work already done.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownstreamError {
    #[error("not found")]
    NotFound,

    #[error("forbidden")]
    Forbidden,

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport: {0}")]
    Transport(String),
}

impl DownstreamError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden)
    }
}

/// Why a log entry could not be resolved. Any of these halts the current pass.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("payload decode: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("unsupported payload version {version} for action {action}")]
    UnsupportedVersion { action: String, version: i32 },

    #[error("downstream: {0}")]
    Downstream(#[from] DownstreamError),

    #[error("target {identifier} is not unique ({count} matches)")]
    TargetNotUnique { identifier: String, count: usize },
}
