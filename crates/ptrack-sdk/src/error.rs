use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by [`crate::Tracker`].
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("store error: {0}")]
    Store(#[from] ptrack_store::StoreError),

    #[error("domain error: {0}")]
    Domain(#[from] ptrack_domain::DomainError),

    #[error("social list error: {0}")]
    Social(#[from] ptrack_social::SocialError),

    #[error("visibility error: {0}")]
    Visibility(#[from] ptrack_visibility::VisibilityError),
}

pub type SdkResult<T> = Result<T, SdkError>;
