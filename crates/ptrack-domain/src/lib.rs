//! Taxonomy services for PlayerTrack.
//!
//! Each service owns a [`ptrack_cache::KeyedCache`] and reaches the store
//! and its sibling services through handles passed in at construction.
//! Writes go to the store first; caches change only after the store
//! accepted the write.
//!
//! # Services
//!
//! - [`SettingsService`] -- persisted user settings
//! - [`PlayerDirectory`] -- tracked players and their category/tag links
//! - [`CategoryStore`] -- ranked categories, including dynamic ones
//! - [`TagStore`] -- tags
//! - [`ConfigResolver`] -- player/category/default config inheritance

pub mod categories;
pub mod error;
pub mod filter;
pub mod players;
pub mod resolver;
pub mod settings;
pub mod tags;

pub use categories::CategoryStore;
pub use error::{DomainError, DomainResult};
pub use filter::PlayerFilter;
pub use players::PlayerDirectory;
pub use resolver::ConfigResolver;
pub use settings::SettingsService;
pub use tags::TagStore;
