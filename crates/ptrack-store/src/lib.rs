//! Repository boundary for PlayerTrack.
//!
//! Every persisted entity is reached through its own repository trait. The
//! traits are synchronous: each call is individually atomic, but nothing here
//! groups calls into transactions.
//!
//! # Storage Backends
//!
//! - [`InMemoryStore`] -- `HashMap`-based store for tests, the CLI and
//!   embedding. It counts mutating calls so callers can assert that a
//!   reconciliation pass wrote nothing.
//!
//! # Failure Model
//!
//! - Backend failures are `Err(StoreError)`.
//! - `update_*` / `delete_*` on a missing row return `Ok(false)`; callers
//!   treat that as "not applied".

use std::sync::Arc;

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::{
    CategoryRepo, PlayerCategoryRepo, PlayerConfigRepo, PlayerRepo, PlayerTagRepo, SettingsRepo,
    SocialListMemberRepo, SocialListRepo, TagRepo, TrackerStore,
};

/// Shared handle to a complete store, as held by the domain services.
pub type SharedStore = Arc<dyn TrackerStore>;
