//! High-level PlayerTrack API.
//!
//! [`Tracker`] is the composition root: it loads the caches from a store,
//! starts the background queue and hands each service the collaborators it
//! needs. Applications embedding PlayerTrack start here.

pub mod config;
pub mod error;
pub mod tracker;

pub use config::TrackerConfig;
pub use error::{SdkError, SdkResult};
pub use tracker::Tracker;

// Re-export key types
pub use ptrack_social::{LocalCharacter, LocalIdentity, ReconcileReport, StaticIdentity};
pub use ptrack_types::{
    Category, CategoryId, ContentId, MembersSnapshot, Player, PlayerId, SnapshotMember,
    SocialList, SocialListType, Tag, TagId, VisibilityType,
};
pub use ptrack_visibility::{FullSyncReport, InMemoryVisibilityApi, VisibilityApi};
