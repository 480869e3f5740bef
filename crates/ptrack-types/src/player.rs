use serde::{Deserialize, Serialize};

use crate::config::{PlayerConfig, PlayerConfigKind, DEFAULT_COLOR, DEFAULT_LIST_ICON};
use crate::ids::{CategoryId, ContentId, PlayerId, TagId, WorldId};

/// Build the lookup key for a name/world pair.
///
/// Spaces become underscores and the name is upper-cased, so
/// `("Jane Doe", 123)` maps to `JANE_DOE_123`.
pub fn player_key(name: &str, world_id: WorldId) -> String {
    format!("{}_{}", name.replace(' ', "_").to_uppercase(), world_id)
}

/// Values computed from the player's categories and config tiers.
///
/// Never persisted; recomputed whenever a category the player belongs to
/// changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedFields {
    pub primary_category_id: Option<CategoryId>,
    pub name_color: u32,
    pub icon: char,
}

impl Default for DerivedFields {
    fn default() -> Self {
        Self {
            primary_category_id: None,
            name_color: DEFAULT_COLOR,
            icon: DEFAULT_LIST_ICON,
        }
    }
}

/// A tracked player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub key: String,
    pub name: String,
    pub world_id: WorldId,
    pub content_id: ContentId,
    /// Assigned categories, loaded from the player/category link table.
    #[serde(default)]
    pub assigned_categories: Vec<CategoryId>,
    /// Assigned tags, loaded from the player/tag link table.
    #[serde(default)]
    pub assigned_tags: Vec<TagId>,
    pub config: PlayerConfig,
    #[serde(skip)]
    pub derived: DerivedFields,
}

impl Player {
    /// Unsaved player; the repository assigns the id.
    pub fn new(name: impl Into<String>, world_id: WorldId, content_id: ContentId) -> Self {
        let name = name.into();
        Self {
            id: PlayerId(0),
            key: player_key(&name, world_id),
            name,
            world_id,
            content_id,
            assigned_categories: Vec::new(),
            assigned_tags: Vec::new(),
            config: PlayerConfig::new(PlayerConfigKind::Player),
            derived: DerivedFields::default(),
        }
    }

    /// True if `id` is among the assigned categories.
    pub fn has_category(&self, id: CategoryId) -> bool {
        self.assigned_categories.contains(&id)
    }

    pub fn has_tag(&self, id: TagId) -> bool {
        self.assigned_tags.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_normalizes_name() {
        assert_eq!(player_key("Jane Doe", 123), "JANE_DOE_123");
        assert_eq!(player_key("jane doe", 123), player_key("JANE DOE", 123));
        assert_ne!(player_key("Jane Doe", 1), player_key("Jane Doe", 2));
    }

    #[test]
    fn new_player_has_derived_key() {
        let p = Player::new("Jane Doe", 42, ContentId::UNKNOWN);
        assert_eq!(p.key, "JANE_DOE_42");
        assert!(p.assigned_categories.is_empty());
        assert_eq!(p.config.kind, PlayerConfigKind::Player);
    }
}
