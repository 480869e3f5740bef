use serde::{Deserialize, Serialize};

use ptrack_types::{CategoryId, PlayerId};

/// Classification of notifications, used for subscriber filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The category set, ranks or names changed.
    CategoriesChanged,
    /// One category's config override changed.
    CategoryConfigChanged,
    /// The tag set changed.
    TagsChanged,
    /// One player's row, links or overrides changed.
    PlayerUpdated,
    /// Many players changed at once (bulk assignment, reload).
    PlayersChanged,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CategoriesChanged => "CategoriesChanged",
            Self::CategoryConfigChanged => "CategoryConfigChanged",
            Self::TagsChanged => "TagsChanged",
            Self::PlayerUpdated => "PlayerUpdated",
            Self::PlayersChanged => "PlayersChanged",
        };
        write!(f, "{s}")
    }
}

/// A cache-updated signal published after a mutation has been persisted and
/// applied to the caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Notification {
    CategoriesChanged,
    CategoryConfigChanged(CategoryId),
    TagsChanged,
    PlayerUpdated(PlayerId),
    PlayersChanged,
}

impl Notification {
    /// Kind used for subscriber filtering.
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::CategoriesChanged => NotificationKind::CategoriesChanged,
            Self::CategoryConfigChanged(_) => NotificationKind::CategoryConfigChanged,
            Self::TagsChanged => NotificationKind::TagsChanged,
            Self::PlayerUpdated(_) => NotificationKind::PlayerUpdated,
            Self::PlayersChanged => NotificationKind::PlayersChanged,
        }
    }
}
