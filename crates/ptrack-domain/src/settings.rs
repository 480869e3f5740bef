use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info};

use ptrack_store::SharedStore;
use ptrack_types::{CategoryId, TrackerSettings};

use crate::error::DomainResult;

/// Persisted user settings with lock-free snapshot reads.
pub struct SettingsService {
    store: SharedStore,
    current: ArcSwap<TrackerSettings>,
}

impl SettingsService {
    /// Load settings from the store, falling back to defaults when none were
    /// saved yet.
    pub fn load(store: SharedStore) -> DomainResult<Self> {
        let settings = match store.load_settings()? {
            Some(settings) => settings,
            None => {
                info!("no saved settings, using defaults");
                TrackerSettings::default()
            }
        };
        Ok(Self {
            store,
            current: ArcSwap::from_pointee(settings),
        })
    }

    /// Current settings snapshot.
    pub fn get(&self) -> Arc<TrackerSettings> {
        self.current.load_full()
    }

    /// Apply `edit` to a copy of the current settings, persist it, then
    /// publish it. Nothing changes if the save fails.
    pub fn update<F>(&self, edit: F) -> DomainResult<Arc<TrackerSettings>>
    where
        F: FnOnce(&mut TrackerSettings),
    {
        let mut next = TrackerSettings::clone(&self.current.load());
        edit(&mut next);
        self.store.save_settings(&next)?;
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        Ok(next)
    }

    /// Drop every reference to a deleted category. Saves only if something
    /// pointed at it.
    pub fn clear_category(&self, category: CategoryId) -> DomainResult<bool> {
        let mut next = TrackerSettings::clone(&self.current.load());
        if !next.clear_category(category) {
            return Ok(false);
        }
        self.store.save_settings(&next)?;
        self.current.store(Arc::new(next));
        debug!(%category, "category cleared from settings");
        Ok(true)
    }
}

impl std::fmt::Debug for SettingsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsService")
            .field("current", &*self.current.load_full())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptrack_store::{InMemoryStore, SettingsRepo};
    use ptrack_types::LocationType;

    #[test]
    fn update_persists_before_publishing() {
        let store = Arc::new(InMemoryStore::new());
        let settings = SettingsService::load(store.clone()).unwrap();
        assert!(!settings.get().sync_with_visibility);

        settings.update(|s| s.sync_with_visibility = true).unwrap();
        assert!(settings.get().sync_with_visibility);
        assert!(store.load_settings().unwrap().unwrap().sync_with_visibility);

        store.set_read_only(true);
        assert!(settings.update(|s| s.sync_with_visibility = false).is_err());
        assert!(settings.get().sync_with_visibility);
    }

    #[test]
    fn clear_category_saves_only_when_referenced() {
        let store = Arc::new(InMemoryStore::new());
        let settings = SettingsService::load(store.clone()).unwrap();
        settings
            .update(|s| {
                s.location_defaults
                    .set(LocationType::Content, Some(CategoryId(4)))
            })
            .unwrap();
        let writes = store.writes();

        assert!(!settings.clear_category(CategoryId(9)).unwrap());
        assert_eq!(store.writes(), writes);

        assert!(settings.clear_category(CategoryId(4)).unwrap());
        assert_eq!(settings.get().location_defaults.content, None);
    }
}
