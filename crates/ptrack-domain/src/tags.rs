use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use ptrack_cache::KeyedCache;
use ptrack_fabric::{Notification, NotificationHub};
use ptrack_store::SharedStore;
use ptrack_types::{Tag, TagId};

use crate::error::DomainResult;
use crate::filter::{with_blank, PlayerFilter};
use crate::players::PlayerDirectory;

#[derive(Debug, Default)]
struct TagViews {
    names: Vec<String>,
    names_with_blank: Vec<String>,
    filter: Arc<PlayerFilter<TagId>>,
}

/// Unordered tags, with name and filter views rebuilt after every mutation.
pub struct TagStore {
    store: SharedStore,
    cache: KeyedCache<TagId, Tag>,
    views: ArcSwap<TagViews>,
    players: Arc<PlayerDirectory>,
    hub: Arc<NotificationHub>,
    write_lock: Mutex<()>,
}

impl TagStore {
    /// Read every tag from `store` and build the cache.
    pub fn load(
        store: SharedStore,
        players: Arc<PlayerDirectory>,
        hub: Arc<NotificationHub>,
    ) -> DomainResult<Self> {
        let tags = store.list_tags()?;
        info!(count = tags.len(), "tags loaded");
        let this = Self {
            store,
            cache: KeyedCache::from_map(tags.into_iter().map(|t| (t.id, t)).collect()),
            views: ArcSwap::from_pointee(TagViews::default()),
            players,
            hub,
            write_lock: Mutex::new(()),
        };
        this.rebuild_views();
        Ok(this)
    }

    /// Cached tag by id.
    pub fn get(&self, id: TagId) -> Option<Tag> {
        self.cache.get(&id)
    }

    /// Tag by name, ignoring case.
    pub fn by_name(&self, name: &str) -> Option<Tag> {
        self.cache.find_first(|t| t.name == name)
    }

    /// Tags in creation order.
    pub fn tags(&self) -> Vec<Tag> {
        let mut all = self.cache.values();
        all.sort_by_key(|t| t.id);
        all
    }

    /// Tag names, optionally with a leading blank entry.
    pub fn names(&self, include_blank: bool) -> Vec<String> {
        let views = self.views.load();
        if include_blank {
            views.names_with_blank.clone()
        } else {
            views.names.clone()
        }
    }

    /// Selection list for the tag filter.
    pub fn filters(&self) -> Arc<PlayerFilter<TagId>> {
        Arc::clone(&self.views.load().filter)
    }

    /// Persist a new tag and cache it.
    pub fn create(&self, name: &str, color: u32) -> DomainResult<Tag> {
        let _guard = self.lock();
        let mut tag = Tag::new(name, color);
        tag.id = self.store.create_tag(&tag)?;
        self.cache.add(tag.id, tag.clone());
        debug!(tag = %tag.id, name, "tag created");
        self.after_change();
        Ok(tag)
    }

    /// Save a tag's name and colour. Returns false if it was not applied.
    pub fn update(&self, tag: &Tag) -> DomainResult<bool> {
        let _guard = self.lock();
        if !self.store.update_tag(tag)? {
            warn!(tag = %tag.id, "tag update not applied");
            return Ok(false);
        }
        let applied = self.cache.update(tag.id, tag.clone());
        self.after_change();
        Ok(applied)
    }

    /// Delete a tag. Player links go first so no player is left pointing at
    /// a missing tag.
    pub fn delete(&self, id: TagId) -> DomainResult<bool> {
        let _guard = self.lock();
        if !self.cache.contains_key(&id) {
            return Ok(false);
        }
        let unlinked = self.players.remove_tag(id)?;
        let deleted = self.store.delete_tag(id)?;
        self.cache.remove(&id);
        info!(tag = %id, unlinked, "tag deleted");
        self.after_change();
        Ok(deleted)
    }

    fn after_change(&self) {
        self.rebuild_views();
        self.hub.publish(Notification::TagsChanged);
    }

    fn rebuild_views(&self) {
        let tags = self.tags();
        let names: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();
        self.views.store(Arc::new(TagViews {
            names_with_blank: with_blank(&names),
            names,
            filter: Arc::new(PlayerFilter::build(
                tags.iter().map(|t| (t.id, t.name.as_str())),
            )),
        }));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagStore")
            .field("tags", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ConfigResolver;
    use ptrack_store::InMemoryStore;
    use ptrack_types::{ContentId, PlayerConfig};

    fn fixture() -> (Arc<InMemoryStore>, Arc<PlayerDirectory>, TagStore) {
        let store = Arc::new(InMemoryStore::new());
        let hub = Arc::new(NotificationHub::default());
        let players = Arc::new(PlayerDirectory::new(store.clone(), hub.clone()));
        let tags = TagStore::load(store.clone(), players.clone(), hub).unwrap();
        (store, players, tags)
    }

    #[test]
    fn delete_unlinks_players_first() {
        let (_store, players, tags) = fixture();
        let resolver = ConfigResolver::new(PlayerConfig::default(), []);
        let p = players.create("A B", 1, ContentId(1), &resolver).unwrap();
        let pvp = tags.create("pvp", 5).unwrap();
        let crafter = tags.create("crafter", 6).unwrap();
        players.assign_tag(p.id, pvp.id).unwrap();
        players.assign_tag(p.id, crafter.id).unwrap();

        assert!(tags.delete(pvp.id).unwrap());
        assert_eq!(players.get(p.id).unwrap().assigned_tags, vec![crafter.id]);
        assert!(tags.get(pvp.id).is_none());
        assert!(!tags.delete(pvp.id).unwrap());
    }

    #[test]
    fn views_follow_mutations() {
        let (_store, _players, tags) = fixture();
        let a = tags.create("alpha", 1).unwrap();
        tags.create("beta", 2).unwrap();
        assert_eq!(tags.names(true), vec!["", "alpha", "beta"]);

        let mut renamed = a.clone();
        renamed.name = "gamma".into();
        assert!(tags.update(&renamed).unwrap());
        assert_eq!(tags.names(false), vec!["gamma", "beta"]);
        assert_eq!(tags.filters().id_at(1), Some(a.id));
        assert_eq!(tags.by_name("gamma").unwrap().id, a.id);
    }

    #[test]
    fn failed_update_keeps_cached_tag() {
        let (store, _players, tags) = fixture();
        let a = tags.create("alpha", 1).unwrap();
        store.set_read_only(true);
        let mut renamed = a.clone();
        renamed.name = "gamma".into();
        assert!(tags.update(&renamed).is_err());
        assert_eq!(tags.get(a.id).unwrap().name, "alpha");
    }
}
