//! Social list reconciliation for PlayerTrack.
//!
//! Roster snapshots arrive from the host client one page at a time.
//! [`SocialListReconciler::handle_snapshot`] resolves the local character
//! that owns the roster and hands the rest to a background job, which
//! updates the persisted members, resolves them to tracked players and
//! keeps the list's dynamic category in step.

pub mod error;
pub mod identity;
pub mod locks;
pub mod naming;
pub mod reconciler;

pub use error::{SocialError, SocialResult};
pub use identity::{LocalCharacter, LocalIdentity, StaticIdentity};
pub use locks::IdentityLocks;
pub use naming::{category_name, list_name};
pub use reconciler::{ReconcileReport, SocialListReconciler};
