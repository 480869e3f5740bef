/// Errors from the visibility integration.
#[derive(Debug, thiserror::Error)]
pub enum VisibilityError {
    /// Sync is disabled or the external API is missing or too old.
    #[error("visibility integration unavailable")]
    Unavailable,

    /// A category sync is already running; this request was dropped.
    #[error("visibility sync already in progress")]
    AlreadySyncing,

    #[error("malformed list entry {line:?}: {reason}")]
    Parse { line: String, reason: String },

    /// The external API rejected or failed a call.
    #[error("visibility api call {call} failed: {message}")]
    Api { call: &'static str, message: String },

    #[error("domain error: {0}")]
    Domain(#[from] ptrack_domain::DomainError),
}

/// Result type for visibility sync.
pub type VisibilityResult<T> = Result<T, VisibilityError>;
