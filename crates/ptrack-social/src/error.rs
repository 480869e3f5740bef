use ptrack_types::{CategoryId, SocialListKey};

/// Errors from social list reconciliation and management.
#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    /// No logged-in character, or its data center is unknown.
    #[error("local identity unavailable: {0}")]
    IdentityUnavailable(&'static str),

    /// The list row for a first-seen identity could not be inserted. Nothing
    /// else in the snapshot is processed.
    #[error("failed to create social list {key}: {source}")]
    ListCreateFailed {
        key: SocialListKey,
        source: ptrack_store::StoreError,
    },

    /// A category that should be dynamic has no linked list.
    #[error("category {0} is not linked to a social list")]
    NotDynamic(CategoryId),

    #[error("store error: {0}")]
    Store(#[from] ptrack_store::StoreError),

    #[error("domain error: {0}")]
    Domain(#[from] ptrack_domain::DomainError),

    #[error("background dispatch failed: {0}")]
    Fabric(#[from] ptrack_fabric::FabricError),
}

pub type SocialResult<T> = Result<T, SocialError>;
