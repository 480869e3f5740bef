//! Cached tracked players and their category/tag links.
//!
//! Every mutation is written to the store first. The cache changes only
//! after the store accepted the write, and a notification goes out after
//! the cache changed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use ptrack_cache::KeyedCache;
use ptrack_fabric::{Notification, NotificationHub};
use ptrack_store::SharedStore;
use ptrack_types::{player_key, CategoryId, ContentId, Player, PlayerId, TagId, WorldId};

use crate::error::{DomainError, DomainResult};
use crate::resolver::ConfigResolver;

/// Tracked players, cached by id.
pub struct PlayerDirectory {
    store: SharedStore,
    hub: Arc<NotificationHub>,
    cache: KeyedCache<PlayerId, Player>,
}

impl PlayerDirectory {
    /// Empty directory; call [`PlayerDirectory::load`] to fill it.
    pub fn new(store: SharedStore, hub: Arc<NotificationHub>) -> Self {
        Self {
            store,
            hub,
            cache: KeyedCache::new(),
        }
    }

    /// Replace the cache with every player in the store.
    pub fn load(&self, resolver: &ConfigResolver) -> DomainResult<usize> {
        let map = self.load_map(resolver)?;
        let count = map.len();
        self.cache.replace(map);
        debug!(count, "players loaded");
        Ok(count)
    }

    /// Like [`PlayerDirectory::load`], but a store failure keeps the current
    /// cache and is only logged.
    pub fn reload(&self, resolver: &ConfigResolver) -> bool {
        let reloaded = self.cache.reload("players", || self.load_map(resolver));
        if reloaded {
            self.hub.publish(Notification::PlayersChanged);
        }
        reloaded
    }

    fn load_map(&self, resolver: &ConfigResolver) -> DomainResult<HashMap<PlayerId, Player>> {
        Ok(self
            .store
            .list_players()?
            .into_iter()
            .map(|mut p| {
                p.derived = resolver.derive(&p);
                (p.id, p)
            })
            .collect())
    }

    /// Cached player by id.
    pub fn get(&self, id: PlayerId) -> Option<Player> {
        self.cache.get(&id)
    }

    /// Player with a known content id, if tracked.
    pub fn find_by_content_id(&self, content_id: ContentId) -> Option<Player> {
        if !content_id.is_known() {
            return None;
        }
        self.cache.find_first(|p| p.content_id == content_id)
    }

    /// Player by key (`NAME_WITH_UNDERSCORES_<world>`).
    pub fn find_by_key(&self, key: &str) -> Option<Player> {
        self.cache.find_first(|p| p.key == key)
    }

    /// Match by content id, else by name and world.
    pub fn find(&self, content_id: ContentId, name: &str, world_id: WorldId) -> Option<Player> {
        self.find_by_content_id(content_id)
            .or_else(|| self.find_by_key(&player_key(name, world_id)))
    }

    /// Every cached player.
    pub fn players(&self) -> Vec<Player> {
        self.cache.values()
    }

    /// Players assigned to `category`.
    pub fn category_players(&self, category: CategoryId) -> Vec<Player> {
        self.cache.filter(|p| p.has_category(category))
    }

    /// Number of tracked players.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Persist a new player and cache it with its derived fields filled in.
    pub fn create(
        &self,
        name: &str,
        world_id: WorldId,
        content_id: ContentId,
        resolver: &ConfigResolver,
    ) -> DomainResult<Player> {
        let mut player = Player::new(name, world_id, content_id);
        player.id = self.store.create_player(&player)?;
        player.derived = resolver.derive(&player);
        self.cache.add(player.id, player.clone());
        debug!(player_id = %player.id, key = %player.key, "player created");
        self.hub.publish(Notification::PlayerUpdated(player.id));
        Ok(player)
    }

    /// Persist a player's row and config. Assignment lists on `player` are
    /// ignored; use the assignment methods for links.
    pub fn update(&self, player: &Player, resolver: &ConfigResolver) -> DomainResult<bool> {
        if !self.store.update_player(player)? {
            warn!(player_id = %player.id, "player update not applied");
            return Ok(false);
        }
        let row = player.clone();
        let applied = self.cache.modify(&player.id, |cached| {
            let categories = std::mem::take(&mut cached.assigned_categories);
            let tags = std::mem::take(&mut cached.assigned_tags);
            *cached = row.clone();
            cached.assigned_categories = categories;
            cached.assigned_tags = tags;
            cached.derived = resolver.derive(cached);
        });
        if applied {
            self.hub.publish(Notification::PlayerUpdated(player.id));
        }
        Ok(applied)
    }

    /// Assign every category in `categories` to every player in `players`,
    /// in one batch. Unknown categories and players are skipped. Returns the
    /// number of new links.
    pub fn assign_categories(
        &self,
        players: &[PlayerId],
        categories: &[CategoryId],
        resolver: &ConfigResolver,
    ) -> DomainResult<usize> {
        let categories: Vec<CategoryId> = categories
            .iter()
            .copied()
            .filter(|c| {
                let known = resolver.contains(*c);
                if !known {
                    warn!(category = %c, "cannot assign unknown category");
                }
                known
            })
            .collect();
        if categories.is_empty() {
            return Ok(0);
        }

        let snapshot = self.cache.snapshot();
        let mut links = Vec::new();
        let mut seen = HashSet::new();
        for id in players {
            let Some(player) = snapshot.get(id) else {
                warn!(player_id = %id, "cannot assign categories to unknown player");
                continue;
            };
            for category in &categories {
                if !player.has_category(*category) && seen.insert((*id, *category)) {
                    links.push((*id, *category));
                }
            }
        }
        if links.is_empty() {
            return Ok(0);
        }

        self.store.create_player_categories(&links)?;
        let touched: HashSet<PlayerId> = links.iter().map(|(p, _)| *p).collect();
        for id in &touched {
            self.cache.modify(id, |p| {
                for (player, category) in &links {
                    if player == id && !p.has_category(*category) {
                        p.assigned_categories.push(*category);
                    }
                }
                p.derived = resolver.derive(p);
            });
        }
        debug!(links = links.len(), players = touched.len(), "categories assigned");
        self.hub.publish(Notification::PlayersChanged);
        Ok(links.len())
    }

    /// Drop one category link. Returns false if the player did not have it.
    pub fn unassign_category(
        &self,
        player: PlayerId,
        category: CategoryId,
        resolver: &ConfigResolver,
    ) -> DomainResult<bool> {
        if !self.store.delete_player_category(player, category)? {
            return Ok(false);
        }
        self.cache.modify(&player, |p| {
            p.assigned_categories.retain(|c| *c != category);
            p.derived = resolver.derive(p);
        });
        debug!(player_id = %player, %category, "category unassigned");
        self.hub.publish(Notification::PlayerUpdated(player));
        Ok(true)
    }

    /// Remove `category` from every player. Used when the category is
    /// deleted; `resolver` should already exclude it.
    pub fn clear_category(
        &self,
        category: CategoryId,
        resolver: &ConfigResolver,
    ) -> DomainResult<usize> {
        let removed = self.store.delete_player_categories_by_category(category)?;
        let edited = self.cache.modify_where(
            |p| p.has_category(category),
            |p| {
                p.assigned_categories.retain(|c| *c != category);
                p.derived = resolver.derive(p);
            },
        );
        if edited > 0 {
            self.hub.publish(Notification::PlayersChanged);
        }
        debug!(%category, removed, edited, "category cleared from players");
        Ok(removed)
    }

    /// Link a tag to a player. Returns false if it was already linked.
    pub fn assign_tag(&self, player: PlayerId, tag: TagId) -> DomainResult<bool> {
        if !self.cache.contains_key(&player) {
            return Err(DomainError::PlayerNotFound(player));
        }
        if !self.store.create_player_tag(player, tag)? {
            return Ok(false);
        }
        self.cache.modify(&player, |p| {
            if !p.has_tag(tag) {
                p.assigned_tags.push(tag);
            }
        });
        self.hub.publish(Notification::PlayerUpdated(player));
        Ok(true)
    }

    /// Unlink a tag. Returns false if it was not linked.
    pub fn unassign_tag(&self, player: PlayerId, tag: TagId) -> DomainResult<bool> {
        if !self.store.delete_player_tag(player, tag)? {
            return Ok(false);
        }
        self.cache
            .modify(&player, |p| p.assigned_tags.retain(|t| *t != tag));
        self.hub.publish(Notification::PlayerUpdated(player));
        Ok(true)
    }

    /// Remove `tag` from every player. Used when the tag is deleted.
    pub fn remove_tag(&self, tag: TagId) -> DomainResult<usize> {
        let removed = self.store.delete_player_tags_by_tag(tag)?;
        let edited = self.cache.modify_where(
            |p| p.has_tag(tag),
            |p| p.assigned_tags.retain(|t| *t != tag),
        );
        if edited > 0 {
            self.hub.publish(Notification::PlayersChanged);
        }
        Ok(removed)
    }

    /// Recompute derived fields for the players of `category`, or for every
    /// player when `category` is `None`.
    pub fn refresh_derived(&self, category: Option<CategoryId>, resolver: &ConfigResolver) -> usize {
        let refreshed = self.cache.modify_where(
            |p| category.map_or(true, |c| p.has_category(c)),
            |p| p.derived = resolver.derive(p),
        );
        if refreshed > 0 {
            self.hub.publish(Notification::PlayersChanged);
        }
        refreshed
    }
}

impl std::fmt::Debug for PlayerDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerDirectory")
            .field("players", &self.cache.len())
            .finish()
    }
}
