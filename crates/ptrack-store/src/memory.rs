//! In-memory tracker store for testing and ephemeral use.
//!
//! [`InMemoryStore`] keeps every table in one struct behind a `RwLock` and
//! implements all repository traits. Row ids come from one shared counter
//! starting at 1, so ids are unique across tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ptrack_types::{
    Category, CategoryId, ContentId, Player, PlayerConfig, PlayerConfigKind, PlayerId, SocialList,
    SocialListId, SocialListKey, SocialListMember, SocialListMemberId, Tag, TagId,
    TrackerSettings,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{
    CategoryRepo, PlayerCategoryRepo, PlayerConfigRepo, PlayerRepo, PlayerTagRepo, SettingsRepo,
    SocialListMemberRepo, SocialListRepo, TagRepo,
};

#[derive(Debug, Default)]
struct Tables {
    next_id: u32,
    categories: BTreeMap<CategoryId, Category>,
    category_configs: BTreeMap<CategoryId, PlayerConfig>,
    tags: BTreeMap<TagId, Tag>,
    players: BTreeMap<PlayerId, Player>,
    player_categories: BTreeSet<(PlayerId, CategoryId)>,
    player_tags: BTreeSet<(PlayerId, TagId)>,
    social_lists: BTreeMap<SocialListId, SocialList>,
    members: BTreeMap<SocialListMemberId, SocialListMember>,
    settings: Option<TrackerSettings>,
}

impl Tables {
    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn hydrate(&self, mut player: Player) -> Player {
        player.assigned_categories = self
            .player_categories
            .iter()
            .filter(|(p, _)| *p == player.id)
            .map(|(_, c)| *c)
            .collect();
        player.assigned_tags = self
            .player_tags
            .iter()
            .filter(|(p, _)| *p == player.id)
            .map(|(_, t)| *t)
            .collect();
        player
    }

    fn with_config(&self, mut category: Category) -> Category {
        category.config = self
            .category_configs
            .get(&category.id)
            .cloned()
            .unwrap_or_else(|| PlayerConfig::new(PlayerConfigKind::Category));
        category
    }
}

/// An in-memory implementation of every tracker repository.
///
/// Data is lost when the store is dropped. Every mutating call bumps a write
/// counter, which tests use to assert that an operation touched nothing.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    writes: AtomicU64,
    read_only: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls that reached the store.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reject every subsequent mutation with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        tracing::debug!(read_only, "in-memory store mode changed");
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.tables
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

fn missing(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::MissingReference {
        entity,
        id: id.to_string(),
    }
}

impl CategoryRepo for InMemoryStore {
    fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let t = self.read()?;
        Ok(t.categories
            .values()
            .map(|c| t.with_config(c.clone()))
            .collect())
    }

    fn get_category(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        let t = self.read()?;
        Ok(t.categories.get(&id).map(|c| t.with_config(c.clone())))
    }

    fn create_category(&self, category: &Category) -> StoreResult<CategoryId> {
        let mut t = self.write()?;
        let id = CategoryId(t.allocate());
        let mut row = category.clone();
        row.id = id;
        t.categories.insert(id, row);
        Ok(id)
    }

    fn update_category(&self, category: &Category) -> StoreResult<bool> {
        let mut t = self.write()?;
        match t.categories.get_mut(&category.id) {
            Some(row) => {
                *row = category.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_category(&self, id: CategoryId) -> StoreResult<bool> {
        let mut t = self.write()?;
        Ok(t.categories.remove(&id).is_some())
    }
}

impl TagRepo for InMemoryStore {
    fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        Ok(self.read()?.tags.values().cloned().collect())
    }

    fn create_tag(&self, tag: &Tag) -> StoreResult<TagId> {
        let mut t = self.write()?;
        let id = TagId(t.allocate());
        let mut row = tag.clone();
        row.id = id;
        t.tags.insert(id, row);
        Ok(id)
    }

    fn update_tag(&self, tag: &Tag) -> StoreResult<bool> {
        let mut t = self.write()?;
        match t.tags.get_mut(&tag.id) {
            Some(row) => {
                *row = tag.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_tag(&self, id: TagId) -> StoreResult<bool> {
        let mut t = self.write()?;
        Ok(t.tags.remove(&id).is_some())
    }
}

impl PlayerRepo for InMemoryStore {
    fn list_players(&self) -> StoreResult<Vec<Player>> {
        let t = self.read()?;
        Ok(t.players.values().map(|p| t.hydrate(p.clone())).collect())
    }

    fn get_player(&self, id: PlayerId) -> StoreResult<Option<Player>> {
        let t = self.read()?;
        Ok(t.players.get(&id).map(|p| t.hydrate(p.clone())))
    }

    fn create_player(&self, player: &Player) -> StoreResult<PlayerId> {
        let mut t = self.write()?;
        let id = PlayerId(t.allocate());
        let mut row = player.clone();
        row.id = id;
        row.assigned_categories.clear();
        row.assigned_tags.clear();
        t.players.insert(id, row);
        Ok(id)
    }

    fn update_player(&self, player: &Player) -> StoreResult<bool> {
        let mut t = self.write()?;
        match t.players.get_mut(&player.id) {
            Some(row) => {
                *row = player.clone();
                row.assigned_categories.clear();
                row.assigned_tags.clear();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl PlayerCategoryRepo for InMemoryStore {
    fn create_player_category(&self, player: PlayerId, category: CategoryId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if !t.players.contains_key(&player) {
            return Err(missing("player", player));
        }
        if !t.categories.contains_key(&category) {
            return Err(missing("category", category));
        }
        Ok(t.player_categories.insert((player, category)))
    }

    fn create_player_categories(&self, links: &[(PlayerId, CategoryId)]) -> StoreResult<usize> {
        let mut t = self.write()?;
        for &(player, category) in links {
            if !t.players.contains_key(&player) {
                return Err(missing("player", player));
            }
            if !t.categories.contains_key(&category) {
                return Err(missing("category", category));
            }
        }
        Ok(links
            .iter()
            .filter(|link| t.player_categories.insert(**link))
            .count())
    }

    fn delete_player_category(&self, player: PlayerId, category: CategoryId) -> StoreResult<bool> {
        let mut t = self.write()?;
        Ok(t.player_categories.remove(&(player, category)))
    }

    fn delete_player_categories_by_category(&self, category: CategoryId) -> StoreResult<usize> {
        let mut t = self.write()?;
        let before = t.player_categories.len();
        t.player_categories.retain(|(_, c)| *c != category);
        Ok(before - t.player_categories.len())
    }
}

impl PlayerTagRepo for InMemoryStore {
    fn create_player_tag(&self, player: PlayerId, tag: TagId) -> StoreResult<bool> {
        let mut t = self.write()?;
        if !t.players.contains_key(&player) {
            return Err(missing("player", player));
        }
        if !t.tags.contains_key(&tag) {
            return Err(missing("tag", tag));
        }
        Ok(t.player_tags.insert((player, tag)))
    }

    fn delete_player_tag(&self, player: PlayerId, tag: TagId) -> StoreResult<bool> {
        let mut t = self.write()?;
        Ok(t.player_tags.remove(&(player, tag)))
    }

    fn delete_player_tags_by_tag(&self, tag: TagId) -> StoreResult<usize> {
        let mut t = self.write()?;
        let before = t.player_tags.len();
        t.player_tags.retain(|(_, g)| *g != tag);
        Ok(before - t.player_tags.len())
    }
}

impl PlayerConfigRepo for InMemoryStore {
    fn get_category_config(&self, category: CategoryId) -> StoreResult<Option<PlayerConfig>> {
        Ok(self.read()?.category_configs.get(&category).cloned())
    }

    fn save_category_config(
        &self,
        category: CategoryId,
        config: &PlayerConfig,
    ) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.categories.contains_key(&category) {
            return Err(missing("category", category));
        }
        t.category_configs.insert(category, config.clone());
        Ok(())
    }

    fn delete_category_config(&self, category: CategoryId) -> StoreResult<bool> {
        let mut t = self.write()?;
        Ok(t.category_configs.remove(&category).is_some())
    }
}

impl SocialListRepo for InMemoryStore {
    fn list_social_lists(&self, owner: ContentId) -> StoreResult<Vec<SocialList>> {
        Ok(self
            .read()?
            .social_lists
            .values()
            .filter(|l| l.content_id == owner)
            .cloned()
            .collect())
    }

    fn get_social_list(&self, id: SocialListId) -> StoreResult<Option<SocialList>> {
        Ok(self.read()?.social_lists.get(&id).cloned())
    }

    fn find_social_list(&self, key: &SocialListKey) -> StoreResult<Option<SocialList>> {
        Ok(self
            .read()?
            .social_lists
            .values()
            .find(|l| l.key() == *key)
            .cloned())
    }

    fn create_social_list(&self, list: &SocialList) -> StoreResult<SocialListId> {
        let mut t = self.write()?;
        let key = list.key();
        if t.social_lists.values().any(|l| l.key() == key) {
            return Err(StoreError::Duplicate {
                entity: "social list",
                detail: key.to_string(),
            });
        }
        let id = SocialListId(t.allocate());
        let mut row = list.clone();
        row.id = id;
        if row.created == 0 {
            row.created = chrono::Utc::now().timestamp();
        }
        t.social_lists.insert(id, row);
        tracing::debug!(%id, %key, "social list created");
        Ok(id)
    }

    fn update_social_list(&self, list: &SocialList) -> StoreResult<bool> {
        let mut t = self.write()?;
        match t.social_lists.get_mut(&list.id) {
            Some(row) => {
                *row = list.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_social_list(&self, id: SocialListId) -> StoreResult<bool> {
        let mut t = self.write()?;
        Ok(t.social_lists.remove(&id).is_some())
    }
}

impl SocialListMemberRepo for InMemoryStore {
    fn list_members(&self, list: SocialListId) -> StoreResult<Vec<SocialListMember>> {
        Ok(self
            .read()?
            .members
            .values()
            .filter(|m| m.social_list_id == list)
            .cloned()
            .collect())
    }

    fn list_members_on_page(
        &self,
        list: SocialListId,
        page: u16,
    ) -> StoreResult<Vec<SocialListMember>> {
        Ok(self
            .read()?
            .members
            .values()
            .filter(|m| m.social_list_id == list && m.page_number == page)
            .cloned()
            .collect())
    }

    fn create_member(&self, member: &SocialListMember) -> StoreResult<SocialListMemberId> {
        let mut t = self.write()?;
        if !t.social_lists.contains_key(&member.social_list_id) {
            return Err(missing("social list", member.social_list_id));
        }
        let id = SocialListMemberId(t.allocate());
        let mut row = member.clone();
        row.id = id;
        t.members.insert(id, row);
        Ok(id)
    }

    fn create_members(
        &self,
        members: &[SocialListMember],
    ) -> StoreResult<Vec<SocialListMemberId>> {
        let mut t = self.write()?;
        if let Some(orphan) = members
            .iter()
            .find(|m| !t.social_lists.contains_key(&m.social_list_id))
        {
            return Err(missing("social list", orphan.social_list_id));
        }
        let mut ids = Vec::with_capacity(members.len());
        for member in members {
            let id = SocialListMemberId(t.allocate());
            let mut row = member.clone();
            row.id = id;
            t.members.insert(id, row);
            ids.push(id);
        }
        Ok(ids)
    }

    fn update_member(&self, member: &SocialListMember) -> StoreResult<bool> {
        let mut t = self.write()?;
        match t.members.get_mut(&member.id) {
            Some(row) => {
                *row = member.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_member(&self, id: SocialListMemberId) -> StoreResult<bool> {
        let mut t = self.write()?;
        Ok(t.members.remove(&id).is_some())
    }

    fn delete_members(&self, ids: &[SocialListMemberId]) -> StoreResult<usize> {
        let mut t = self.write()?;
        Ok(ids.iter().filter(|id| t.members.remove(*id).is_some()).count())
    }

    fn delete_all_members(&self, list: SocialListId) -> StoreResult<usize> {
        let mut t = self.write()?;
        let before = t.members.len();
        t.members.retain(|_, m| m.social_list_id != list);
        Ok(before - t.members.len())
    }
}

impl SettingsRepo for InMemoryStore {
    fn load_settings(&self) -> StoreResult<Option<TrackerSettings>> {
        Ok(self.read()?.settings.clone())
    }

    fn save_settings(&self, settings: &TrackerSettings) -> StoreResult<()> {
        self.write()?.settings = Some(settings.clone());
        Ok(())
    }
}
