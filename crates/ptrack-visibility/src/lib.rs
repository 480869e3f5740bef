//! Visibility list integration for PlayerTrack.
//!
//! The external visibility tool keeps two lists, void and white, as plain
//! text lines. [`VisibilityReconciler`] keeps them in step with each
//! player's effective visibility classification: pushing local changes out
//! on category config and player updates, and pulling external entries in
//! as local overrides during a full sync.

pub mod api;
pub mod entry;
pub mod error;
pub mod reconciler;

pub use api::{InMemoryVisibilityApi, VisibilityApi, REQUIRED_API_VERSION};
pub use entry::{entries_by_key, parse_lines, ListKind, ParsedList, VisibilityEntry};
pub use error::{VisibilityError, VisibilityResult};
pub use reconciler::{FullSyncReport, VisibilityReconciler, DEFAULT_REASON};
