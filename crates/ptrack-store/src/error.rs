/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend refused or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A unique constraint would be violated.
    #[error("duplicate {entity}: {detail}")]
    Duplicate { entity: &'static str, detail: String },

    /// A referenced row does not exist.
    #[error("{entity} {id} not found")]
    MissingReference { entity: &'static str, id: String },

    /// A lock protecting backend state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Backend is read-only or otherwise unavailable.
    #[error("store is read-only")]
    ReadOnly,
}

/// Result alias for repository operations.
pub type StoreResult<T> = Result<T, StoreError>;
