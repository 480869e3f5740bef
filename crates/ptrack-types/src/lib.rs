//! Foundation types for PlayerTrack.
//!
//! This crate provides the entity and value types shared by every other
//! PlayerTrack crate. It performs no I/O and holds no shared state.
//!
//! # Key Types
//!
//! - [`Category`] -- ranked grouping label, optionally linked to a social list
//! - [`Tag`] -- unordered label
//! - [`Player`] -- a tracked player and its category/tag assignments
//! - [`PlayerConfig`] -- per-property inherit/override configuration
//! - [`SocialList`] / [`SocialListMember`] -- persisted roster state
//! - [`MembersSnapshot`] -- one externally observed page of a roster
//! - [`TrackerSettings`] -- persisted user settings

pub mod category;
pub mod config;
pub mod error;
pub mod ids;
pub mod player;
pub mod settings;
pub mod social;
pub mod tag;

pub use category::Category;
pub use config::{
    resolve_category, resolve_player, ConfigSource, ConfigValue, Effective, InheritOverride,
    PlayerConfig, PlayerConfigKind, VisibilityType,
};
pub use error::TypeError;
pub use ids::{
    CategoryId, ContentId, DataCenterId, PlayerId, SocialListId, SocialListMemberId, TagId,
    WorldId,
};
pub use player::{player_key, DerivedFields, Player};
pub use settings::{LocationDefaults, LocationType, TrackerSettings};
pub use social::{
    MembersSnapshot, SnapshotMember, SocialList, SocialListKey, SocialListMember, SocialListType,
};
pub use tag::Tag;
