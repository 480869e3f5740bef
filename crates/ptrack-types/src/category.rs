use serde::{Deserialize, Serialize};

use crate::config::{PlayerConfig, PlayerConfigKind};
use crate::ids::{CategoryId, SocialListId};

/// A ranked grouping label applicable to players.
///
/// Ranks are dense and start at 1; rank 1 is the highest priority. A category
/// with a `social_list_id` is *dynamic*: its membership mirrors that list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub rank: u32,
    pub social_list_id: Option<SocialListId>,
    /// Category-tier config override. Persisted separately from the row.
    #[serde(default = "category_config")]
    pub config: PlayerConfig,
}

fn category_config() -> PlayerConfig {
    PlayerConfig::new(PlayerConfigKind::Category)
}

impl Category {
    /// Unsaved category; the repository assigns the id.
    pub fn new(name: impl Into<String>, rank: u32, social_list_id: Option<SocialListId>) -> Self {
        Self {
            id: CategoryId(0),
            name: name.into(),
            rank,
            social_list_id,
            config: category_config(),
        }
    }

    /// True when the category is kept in step with a social list.
    pub fn is_dynamic(&self) -> bool {
        self.social_list_id.is_some()
    }
}
