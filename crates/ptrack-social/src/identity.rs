//! The locally logged-in character that owns social lists.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use ptrack_types::{ContentId, DataCenterId, WorldId};

/// The logged-in character that owns social lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCharacter {
    pub content_id: ContentId,
    pub name: String,
    pub home_world: WorldId,
    /// 0 when the home world's data center is not known.
    #[serde(default)]
    pub data_center_id: DataCenterId,
}

/// Source of local character data, supplied by the host client.
pub trait LocalIdentity: Send + Sync {
    /// The character currently logged in.
    fn current(&self) -> Option<LocalCharacter>;

    /// Any known local character, logged in or not.
    fn character(&self, content_id: ContentId) -> Option<LocalCharacter>;
}

/// Identity backed by a fixed set of characters, for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    current: RwLock<Option<ContentId>>,
    known: RwLock<Vec<LocalCharacter>>,
}

impl StaticIdentity {
    /// No one logged in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity with `character` known and logged in.
    pub fn logged_in(character: LocalCharacter) -> Self {
        let identity = Self::new();
        identity.log_in(character);
        identity
    }

    /// Remember `character` and make it the current one.
    pub fn log_in(&self, character: LocalCharacter) {
        let content_id = character.content_id;
        {
            let mut known = self.known.write().unwrap_or_else(PoisonError::into_inner);
            known.retain(|c| c.content_id != content_id);
            known.push(character);
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(content_id);
    }

    /// Forget the current character.
    pub fn log_out(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl LocalIdentity for StaticIdentity {
    fn current(&self) -> Option<LocalCharacter> {
        let current = (*self.current.read().unwrap_or_else(PoisonError::into_inner))?;
        self.character(current)
    }

    fn character(&self, content_id: ContentId) -> Option<LocalCharacter> {
        self.known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.content_id == content_id)
            .cloned()
    }
}
