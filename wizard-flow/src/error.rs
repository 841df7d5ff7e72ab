use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The event was well-formed for the current state but its payload failed validation.
    #[error("Transition rejected: {0}")]
    Rejected(String),

    #[error("Event '{event}' is not allowed in state '{state}'")]
    InvalidTransition { state: String, event: String },

    #[error("Stale operation for session {session_id}: issued at epoch {issued}, session is at {current}")]
    StaleOperation {
        session_id: String,
        issued: u64,
        current: u64,
    },

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
