//! Ranked categories.
//!
//! Ranks are dense and start at 1. Every mutation persists first, then
//! updates the cache, rebuilds the derived name and filter views, refreshes
//! the derived fields of affected players and finally publishes
//! [`Notification::CategoriesChanged`].
//!
//! Mutations are serialized by an internal lock; reads never take it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::{debug, error, info, warn};

use ptrack_cache::KeyedCache;
use ptrack_fabric::{Notification, NotificationHub};
use ptrack_store::SharedStore;
use ptrack_types::{Category, CategoryId, PlayerConfig, SocialListId};

use crate::error::{DomainError, DomainResult};
use crate::filter::{with_blank, PlayerFilter};
use crate::players::PlayerDirectory;
use crate::resolver::ConfigResolver;
use crate::settings::SettingsService;

#[derive(Debug, Default)]
struct CategoryViews {
    names: Vec<String>,
    names_with_blank: Vec<String>,
    static_names: Vec<String>,
    static_names_with_blank: Vec<String>,
    filter: Arc<PlayerFilter<CategoryId>>,
}

impl CategoryViews {
    fn build(by_rank: &[Category]) -> Self {
        let names: Vec<String> = by_rank.iter().map(|c| c.name.clone()).collect();
        let static_names: Vec<String> = by_rank
            .iter()
            .filter(|c| !c.is_dynamic())
            .map(|c| c.name.clone())
            .collect();
        Self {
            names_with_blank: with_blank(&names),
            static_names_with_blank: with_blank(&static_names),
            filter: Arc::new(PlayerFilter::build(
                by_rank.iter().map(|c| (c.id, c.name.as_str())),
            )),
            names,
            static_names,
        }
    }
}

/// Ranked categories, cached and kept in step with the store.
pub struct CategoryStore {
    store: SharedStore,
    cache: KeyedCache<CategoryId, Category>,
    views: ArcSwap<CategoryViews>,
    players: Arc<PlayerDirectory>,
    settings: Arc<SettingsService>,
    hub: Arc<NotificationHub>,
    write_lock: Mutex<()>,
}

impl CategoryStore {
    /// Load every category, with its config override, from the store.
    pub fn load(
        store: SharedStore,
        players: Arc<PlayerDirectory>,
        settings: Arc<SettingsService>,
        hub: Arc<NotificationHub>,
    ) -> DomainResult<Self> {
        let categories = store.list_categories()?;
        let count = categories.len();
        let this = Self {
            store,
            cache: KeyedCache::from_map(categories.into_iter().map(|c| (c.id, c)).collect()),
            views: ArcSwap::from_pointee(CategoryViews::default()),
            players,
            settings,
            hub,
            write_lock: Mutex::new(()),
        };
        this.rebuild_views();
        info!(count, "categories loaded");
        Ok(this)
    }

    /// Re-read every category from the store. On failure the current cache is
    /// kept.
    pub fn reload(&self) -> bool {
        let _guard = self.lock();
        let store = &self.store;
        let reloaded = self.cache.reload("categories", || {
            store
                .list_categories()
                .map(|all| all.into_iter().map(|c| (c.id, c)).collect())
        });
        if reloaded {
            self.after_change(None);
        }
        reloaded
    }

    // ---- Reads ----

    /// Cached category by id.
    pub fn get(&self, id: CategoryId) -> Option<Category> {
        self.cache.get(&id)
    }

    /// Case-insensitive name lookup.
    pub fn by_name(&self, name: &str) -> Option<Category> {
        self.cache.find_first(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The dynamic category linked to `list`, if any.
    pub fn synced_category(&self, list: SocialListId) -> Option<Category> {
        self.cache.find_first(|c| c.social_list_id == Some(list))
    }

    /// Categories in rank order.
    pub fn categories(&self, include_dynamic: bool) -> Vec<Category> {
        let mut all = if include_dynamic {
            self.cache.values()
        } else {
            self.cache.filter(|c| !c.is_dynamic())
        };
        all.sort_by_key(|c| (c.rank, c.id));
        all
    }

    /// Rank of every category, keyed by id.
    pub fn ranks(&self) -> HashMap<CategoryId, u32> {
        self.cache
            .snapshot()
            .values()
            .map(|c| (c.id, c.rank))
            .collect()
    }

    /// Category names in rank order, optionally with a leading blank entry
    /// and optionally including dynamic categories.
    pub fn names(&self, include_blank: bool, include_dynamic: bool) -> Vec<String> {
        let views = self.views.load();
        match (include_dynamic, include_blank) {
            (true, true) => views.names_with_blank.clone(),
            (true, false) => views.names.clone(),
            (false, true) => views.static_names_with_blank.clone(),
            (false, false) => views.static_names.clone(),
        }
    }

    /// Selection list for the category filter.
    pub fn filters(&self) -> Arc<PlayerFilter<CategoryId>> {
        Arc::clone(&self.views.load().filter)
    }

    /// False when the category is unknown or there are no categories.
    pub fn is_min_rank(&self, id: CategoryId) -> bool {
        self.rank_bound(id, |ranks| ranks.iter().copied().min())
    }

    /// False when the category is unknown or there are no categories.
    pub fn is_max_rank(&self, id: CategoryId) -> bool {
        self.rank_bound(id, |ranks| ranks.iter().copied().max())
    }

    fn rank_bound(&self, id: CategoryId, bound: fn(&[u32]) -> Option<u32>) -> bool {
        let snapshot = self.cache.snapshot();
        let Some(target) = snapshot.get(&id) else {
            return false;
        };
        let ranks: Vec<u32> = snapshot.values().map(|c| c.rank).collect();
        bound(&ranks) == Some(target.rank)
    }

    /// Config resolver over the current categories and default config.
    pub fn resolver(&self) -> ConfigResolver {
        ConfigResolver::new(
            self.settings.get().default_player_config.clone(),
            self.cache.values(),
        )
    }

    // ---- Mutations ----

    /// Create a category at the bottom of the ranking.
    pub fn create(&self, name: &str, social_list: Option<SocialListId>) -> DomainResult<Category> {
        let _guard = self.lock();
        let rank = self
            .cache
            .snapshot()
            .values()
            .map(|c| c.rank)
            .max()
            .map_or(1, |max| max + 1);
        let mut category = Category::new(name, rank, social_list);
        category.id = self.store.create_category(&category)?;
        self.cache.add(category.id, category.clone());
        debug!(category = %category.id, name, rank, "category created");
        self.rebuild_views();
        self.hub.publish(Notification::CategoriesChanged);
        Ok(category)
    }

    /// Persist a category row (name, rank, link). The config override is
    /// kept from the cache; use [`CategoryStore::update_config`] for it.
    pub fn update(&self, category: &Category) -> DomainResult<bool> {
        let _guard = self.lock();
        let Some(mut next) = self.cache.get(&category.id) else {
            return Ok(false);
        };
        next.name = category.name.clone();
        next.rank = category.rank;
        next.social_list_id = category.social_list_id;
        if !self.persist_row(&next)? {
            return Ok(false);
        }
        self.after_change(Some(category.id));
        Ok(true)
    }

    /// Persist a category's config override and publish
    /// [`Notification::CategoryConfigChanged`].
    pub fn update_config(&self, id: CategoryId, config: &PlayerConfig) -> DomainResult<bool> {
        let _guard = self.lock();
        if !self.cache.contains_key(&id) {
            return Ok(false);
        }
        self.store.save_category_config(id, config)?;
        let applied = self.cache.modify(&id, |c| c.config = config.clone());
        self.after_change(Some(id));
        self.hub.publish(Notification::CategoryConfigChanged(id));
        Ok(applied)
    }

    /// Delete a category and everything that points at it.
    ///
    /// Categories ranked below the target move up one rank first, then the
    /// target's player links, config override, row and settings references
    /// are removed. A social list linked to a dynamic category is left as is.
    pub fn delete(&self, id: CategoryId) -> DomainResult<bool> {
        let _guard = self.lock();
        let Some(target) = self.cache.get(&id) else {
            return Ok(false);
        };

        for mut below in self
            .categories(true)
            .into_iter()
            .filter(|c| c.rank > target.rank)
        {
            below.rank -= 1;
            if let Err(e) = self.persist_row(&below) {
                error!(category = %below.id, error = %e, "failed to close rank gap");
            }
        }

        let remaining = ConfigResolver::new(
            self.settings.get().default_player_config.clone(),
            self.cache.values().into_iter().filter(|c| c.id != id),
        );
        self.players.clear_category(id, &remaining)?;
        self.store.delete_category_config(id)?;
        if !self.store.delete_category(id)? {
            warn!(category = %id, "category row already gone");
        }
        if let Err(e) = self.settings.clear_category(id) {
            error!(category = %id, error = %e, "failed to clear category from settings");
        }
        self.cache.remove(&id);
        info!(category = %id, name = %target.name, "category deleted");
        self.after_change(None);
        Ok(true)
    }

    /// Move a category one step toward rank 1.
    pub fn increase_rank(&self, id: CategoryId) -> DomainResult<bool> {
        self.swap_rank(id, Direction::Up)
    }

    /// Move a category one step away from rank 1.
    pub fn decrease_rank(&self, id: CategoryId) -> DomainResult<bool> {
        self.swap_rank(id, Direction::Down)
    }

    fn swap_rank(&self, id: CategoryId, direction: Direction) -> DomainResult<bool> {
        let _guard = self.lock();
        let categories = self.categories(true);
        let Some(current) = categories.iter().find(|c| c.id == id) else {
            return Err(DomainError::CategoryNotFound(id));
        };
        let neighbour_rank = match direction {
            Direction::Up => current.rank.checked_sub(1),
            Direction::Down => current.rank.checked_add(1),
        };
        let Some(neighbour) = neighbour_rank
            .and_then(|rank| categories.iter().find(|c| c.rank == rank))
        else {
            debug!(category = %id, ?direction, "no neighbour to swap with");
            return Ok(false);
        };

        let mut moved = current.clone();
        let mut displaced = neighbour.clone();
        std::mem::swap(&mut moved.rank, &mut displaced.rank);
        self.persist_row(&moved)?;
        self.persist_row(&displaced)?;

        self.normalize_ranks()?;
        self.after_change(None);
        Ok(true)
    }

    /// Rewrite any rank that does not match its 1-based position.
    fn normalize_ranks(&self) -> DomainResult<usize> {
        let mut fixed = 0;
        for (position, mut category) in self.categories(true).into_iter().enumerate() {
            let expected = position as u32 + 1;
            if category.rank != expected {
                warn!(category = %category.id, found = category.rank, expected, "rank drift corrected");
                category.rank = expected;
                self.persist_row(&category)?;
                fixed += 1;
            }
        }
        Ok(fixed)
    }

    fn persist_row(&self, category: &Category) -> DomainResult<bool> {
        if !self.store.update_category(category)? {
            warn!(category = %category.id, "category update not applied");
            return Ok(false);
        }
        Ok(self.cache.update(category.id, category.clone()))
    }

    fn after_change(&self, category: Option<CategoryId>) {
        self.rebuild_views();
        self.players.refresh_derived(category, &self.resolver());
        self.hub.publish(Notification::CategoriesChanged);
    }

    fn rebuild_views(&self) {
        self.views
            .store(Arc::new(CategoryViews::build(&self.categories(true))));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CategoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryStore")
            .field("categories", &self.cache.len())
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
enum Direction {
    Up,
    Down,
}
