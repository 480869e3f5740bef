use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown social list type: {0}")]
    UnknownListType(String),

    #[error("unknown visibility type: {0}")]
    UnknownVisibilityType(String),
}
