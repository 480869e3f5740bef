use ptrack_types::{CategoryId, PlayerId, TagId};

/// Errors from the taxonomy services.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("store error: {0}")]
    Store(#[from] ptrack_store::StoreError),

    #[error("category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("tag not found: {0}")]
    TagNotFound(TagId),

    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),
}

/// Result type for domain services.
pub type DomainResult<T> = Result<T, DomainError>;
