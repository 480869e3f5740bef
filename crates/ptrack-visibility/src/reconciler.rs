//! Two-way sync between player visibility classifications and the external
//! void and white lists.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use ptrack_domain::{CategoryStore, ConfigResolver, PlayerDirectory, SettingsService};
use ptrack_fabric::{Notification, NotificationFilter, NotificationKind, NotificationStream};
use ptrack_types::{CategoryId, ContentId, Player, VisibilityType};

use crate::api::VisibilityApi;
use crate::entry::{entries_by_key, ListKind, VisibilityEntry};
use crate::error::{VisibilityError, VisibilityResult};

/// Reason tag written on entries this tool adds.
pub const DEFAULT_REASON: &str = "PlayerTrack";

/// Counts from one [`VisibilityReconciler::full_sync`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FullSyncReport {
    pub removed: usize,
    pub added: usize,
    pub players_created: usize,
    pub overrides_applied: usize,
    pub failures: usize,
}

/// Releases the in-flight flag on every exit path.
struct SyncGuard<'a>(&'a AtomicBool);

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard(flag))
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Keeps player visibility classifications and the external lists in
/// step.
pub struct VisibilityReconciler {
    players: Arc<PlayerDirectory>,
    categories: Arc<CategoryStore>,
    settings: Arc<SettingsService>,
    api: Arc<dyn VisibilityApi>,
    reason: String,
    available: AtomicBool,
    syncing: AtomicBool,
}

impl VisibilityReconciler {
    /// Unavailable until [`VisibilityReconciler::initialize`] runs.
    pub fn new(
        players: Arc<PlayerDirectory>,
        categories: Arc<CategoryStore>,
        settings: Arc<SettingsService>,
        api: Arc<dyn VisibilityApi>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            players,
            categories,
            settings,
            api,
            reason: reason.into(),
            available: AtomicBool::new(false),
            syncing: AtomicBool::new(false),
        }
    }

    /// Check the sync setting and the tool's API version, then run a full
    /// sync if both allow it. Returns whether the integration is available.
    pub fn initialize(&self) -> bool {
        let enabled = self.settings.get().sync_with_visibility;
        let available = enabled && self.api.is_available();
        self.available.store(available, Ordering::SeqCst);
        info!(enabled, available, "visibility integration initialised");
        if available {
            match self.full_sync() {
                Ok(report) => info!(?report, "initial visibility sync finished"),
                Err(e) => error!(error = %e, "initial visibility sync failed"),
            }
        }
        available
    }

    /// Whether the last [`VisibilityReconciler::initialize`] found the tool
    /// enabled and compatible.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Notifications the listener loop reacts to.
    pub fn notification_filter() -> NotificationFilter {
        NotificationFilter::kinds([
            NotificationKind::CategoryConfigChanged,
            NotificationKind::PlayerUpdated,
        ])
    }

    /// Push one player's classification to the external lists. Returns the
    /// number of add/remove calls made.
    pub fn sync_player(&self, player: &Player) -> VisibilityResult<usize> {
        self.ensure_available()?;
        let classification = self.categories.resolver().visibility(player);
        let mut calls = 0;

        match ListKind::for_classification(classification) {
            None => {
                for list in ListKind::ALL {
                    if self.fetch(list)?.contains_key(&player.key) {
                        self.api.remove(list, &player.name, player.world_id)?;
                        calls += 1;
                    }
                }
            }
            Some(list) => {
                if !self.fetch(list)?.contains_key(&player.key) {
                    self.api
                        .add(list, &player.name, player.world_id, &self.reason)?;
                    calls += 1;
                }
            }
        }

        if calls > 0 {
            debug!(player_id = %player.id, %classification, calls, "player visibility synced");
        }
        Ok(calls)
    }

    /// Sync every player of a category. Only one category sync runs at a
    /// time; a request arriving meanwhile is dropped.
    pub fn sync_category(&self, id: CategoryId) -> VisibilityResult<usize> {
        let Some(_guard) = SyncGuard::acquire(&self.syncing) else {
            warn!(category = %id, "visibility sync already in progress, request dropped");
            return Err(VisibilityError::AlreadySyncing);
        };
        self.ensure_available()?;
        if self.categories.get(id).is_none() {
            warn!(category = %id, "category not found, nothing to sync");
            return Ok(0);
        }

        let mut calls = 0;
        for player in self.players.category_players(id) {
            match self.sync_player(&player) {
                Ok(n) => calls += n,
                Err(e) => error!(player_id = %player.id, error = %e, "failed to sync player visibility"),
            }
        }
        debug!(category = %id, calls, "category visibility synced");
        Ok(calls)
    }

    /// Converge local classifications and the external lists in both
    /// directions. Individual failures are counted and skipped.
    pub fn full_sync(&self) -> VisibilityResult<FullSyncReport> {
        self.ensure_available()?;
        let resolver = self.categories.resolver();
        let mut report = FullSyncReport::default();

        let mut wanted: HashMap<ListKind, HashMap<String, Player>> = HashMap::new();
        for player in self.players.players() {
            if let Some(list) = ListKind::for_classification(resolver.visibility(&player)) {
                wanted
                    .entry(list)
                    .or_default()
                    .insert(player.key.clone(), player);
            }
        }
        let wants = |list: ListKind, key: &str| {
            wanted.get(&list).is_some_and(|players| players.contains_key(key))
        };

        // Our entries whose tracked player no longer wants them.
        for list in ListKind::ALL {
            let Some(entries) = self.fetch_logged(list, &mut report) else {
                continue;
            };
            for entry in entries.values() {
                let tracked = self.players.find_by_key(&entry.key).is_some();
                if tracked && entry.is_tagged(&self.reason) && !wants(list, &entry.key) {
                    match self.api.remove(list, &entry.name, entry.world_id) {
                        Ok(()) => report.removed += 1,
                        Err(e) => self.failed(&mut report, list, &entry.key, &e),
                    }
                }
            }
        }

        // Players missing from the list they want.
        for list in ListKind::ALL {
            let Some(entries) = self.fetch_logged(list, &mut report) else {
                continue;
            };
            for player in wanted.get(&list).into_iter().flat_map(HashMap::values) {
                if entries.contains_key(&player.key) {
                    continue;
                }
                match self
                    .api
                    .add(list, &player.name, player.world_id, &self.reason)
                {
                    Ok(()) => report.added += 1,
                    Err(e) => self.failed(&mut report, list, &player.key, &e),
                }
            }
        }

        // External entries become local overrides where nothing local says
        // otherwise.
        for list in ListKind::ALL {
            let Some(entries) = self.fetch_logged(list, &mut report) else {
                continue;
            };
            for entry in entries.values() {
                if let Err(e) = self.import_entry(list, entry, &resolver, &mut report) {
                    self.failed(&mut report, list, &entry.key, &e);
                }
            }
        }

        info!(?report, "full visibility sync finished");
        Ok(report)
    }

    fn import_entry(
        &self,
        list: ListKind,
        entry: &VisibilityEntry,
        resolver: &ConfigResolver,
        report: &mut FullSyncReport,
    ) -> VisibilityResult<()> {
        let mut player = match self.players.find_by_key(&entry.key) {
            Some(player) if resolver.visibility(&player) == VisibilityType::None => player,
            Some(_) => return Ok(()),
            None => {
                let player = self.players.create(
                    &entry.name,
                    entry.world_id,
                    ContentId::UNKNOWN,
                    resolver,
                )?;
                report.players_created += 1;
                player
            }
        };
        player.config.visibility.set(list.classification());
        if self.players.update(&player, resolver)? {
            report.overrides_applied += 1;
            debug!(player_id = %player.id, %list, "visibility override imported");
        }
        Ok(())
    }

    /// Listen for category config changes and player updates until the hub
    /// goes away. Each sync runs on the blocking pool.
    pub async fn run(self: Arc<Self>, mut stream: NotificationStream) {
        info!("visibility listener started");
        loop {
            match stream.recv().await {
                Ok(Notification::CategoryConfigChanged(id)) => {
                    let this = Arc::clone(&self);
                    tokio::task::spawn_blocking(move || {
                        log_outcome("category", this.sync_category(id));
                    });
                }
                Ok(Notification::PlayerUpdated(id)) => {
                    let this = Arc::clone(&self);
                    tokio::task::spawn_blocking(move || {
                        if let Some(player) = this.players.get(id) {
                            log_outcome("player", this.sync_player(&player));
                        }
                    });
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "visibility listener lagged, notifications lost");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("visibility listener stopped");
    }

    fn ensure_available(&self) -> VisibilityResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(VisibilityError::Unavailable)
        }
    }

    fn fetch(&self, list: ListKind) -> VisibilityResult<HashMap<String, VisibilityEntry>> {
        let lines = self.api.entries(list)?;
        Ok(entries_by_key(list, &lines))
    }

    fn fetch_logged(
        &self,
        list: ListKind,
        report: &mut FullSyncReport,
    ) -> Option<HashMap<String, VisibilityEntry>> {
        match self.fetch(list) {
            Ok(entries) => Some(entries),
            Err(e) => {
                error!(%list, error = %e, "failed to read visibility list");
                report.failures += 1;
                None
            }
        }
    }

    fn failed(&self, report: &mut FullSyncReport, list: ListKind, key: &str, e: &VisibilityError) {
        report.failures += 1;
        error!(%list, key, error = %e, "visibility sync step failed");
    }
}

fn log_outcome(scope: &str, outcome: VisibilityResult<usize>) {
    match outcome {
        Ok(calls) => debug!(scope, calls, "visibility sync done"),
        Err(VisibilityError::Unavailable) => debug!(scope, "visibility unavailable, sync skipped"),
        Err(VisibilityError::AlreadySyncing) => {}
        Err(e) => error!(scope, error = %e, "visibility sync failed"),
    }
}

impl std::fmt::Debug for VisibilityReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityReconciler")
            .field("reason", &self.reason)
            .field("available", &self.is_available())
            .field("syncing", &self.syncing.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryVisibilityApi;
    use ptrack_fabric::NotificationHub;
    use ptrack_store::InMemoryStore;
    use ptrack_types::{PlayerConfig, PlayerConfigKind, WorldId};
    use std::sync::{mpsc, Mutex, PoisonError};
    use std::time::Duration;

    struct Fixture {
        hub: Arc<NotificationHub>,
        players: Arc<PlayerDirectory>,
        categories: Arc<CategoryStore>,
        reconciler: Arc<VisibilityReconciler>,
    }

    fn build(api: Arc<dyn VisibilityApi>, enabled: bool) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let hub = Arc::new(NotificationHub::default());
        let settings = Arc::new(SettingsService::load(store.clone()).unwrap());
        settings.update(|s| s.sync_with_visibility = enabled).unwrap();
        let players = Arc::new(PlayerDirectory::new(store.clone(), hub.clone()));
        let categories = Arc::new(
            CategoryStore::load(store, players.clone(), settings.clone(), hub.clone()).unwrap(),
        );
        let reconciler = Arc::new(VisibilityReconciler::new(
            players.clone(),
            categories.clone(),
            settings,
            api,
            DEFAULT_REASON,
        ));
        Fixture {
            hub,
            players,
            categories,
            reconciler,
        }
    }

    impl Fixture {
        fn player(&self, name: &str, world: WorldId) -> Player {
            let resolver = self.categories.resolver();
            self.players
                .create(name, world, ContentId::UNKNOWN, &resolver)
                .unwrap()
        }

        /// A category whose config voids its players, with `player` in it.
        fn void_category(&self, player: &Player) -> CategoryId {
            let category = self.categories.create("Hidden", None).unwrap();
            let mut config = PlayerConfig::new(PlayerConfigKind::Category);
            config.visibility.set(VisibilityType::Void);
            self.categories.update_config(category.id, &config).unwrap();
            self.players
                .assign_categories(&[player.id], &[category.id], &self.categories.resolver())
                .unwrap();
            category.id
        }
    }

    #[test]
    fn full_sync_imports_unknown_void_entry() {
        let api = Arc::new(InMemoryVisibilityApi::new());
        api.push_line(ListKind::Void, "Jane Doe 123 PlayerTrack");
        let fx = build(api.clone(), true);

        assert!(fx.reconciler.initialize());
        let jane = fx.players.find_by_key("JANE_DOE_123").unwrap();
        assert!(jane.config.visibility.is_override());
        assert_eq!(jane.config.visibility.value, VisibilityType::Void);
        assert_eq!(api.lines(ListKind::Void), vec!["Jane Doe 123 PlayerTrack"]);
        assert_eq!((api.adds(), api.removes()), (0, 0));
    }

    #[test]
    fn full_sync_converges_both_ways() {
        let api = Arc::new(InMemoryVisibilityApi::new());
        let fx = build(api.clone(), false);
        let ann = fx.player("Ann Lee", 73);
        fx.void_category(&ann);
        let bo = fx.player("Bo Kim", 73);
        api.push_line(ListKind::White, "Bo Kim 73 PlayerTrack");
        let mut bo_row = bo.clone();
        bo_row.config.visibility.set(VisibilityType::None);
        fx.players.update(&bo_row, &fx.categories.resolver()).unwrap();
        api.push_line(ListKind::White, "Cy Ode 74 Manual");

        fx.reconciler.settings.update(|s| s.sync_with_visibility = true).unwrap();
        assert!(fx.reconciler.initialize());

        // Bo's explicit None override removes our entry; Ann is pushed; Cy is
        // imported.
        assert_eq!(api.lines(ListKind::Void), vec!["Ann Lee 73 PlayerTrack"]);
        assert_eq!(api.lines(ListKind::White), vec!["Cy Ode 74 Manual"]);
        let cy = fx.players.find_by_key("CY_ODE_74").unwrap();
        assert_eq!(cy.config.visibility.value, VisibilityType::White);

        let second = fx.reconciler.full_sync().unwrap();
        assert_eq!(second, FullSyncReport::default());
    }

    #[test]
    fn converged_player_sync_makes_no_calls() {
        let api = Arc::new(InMemoryVisibilityApi::new());
        let fx = build(api.clone(), true);
        assert!(fx.reconciler.initialize());
        let ann = fx.player("Ann Lee", 73);
        fx.void_category(&ann);
        let ann = fx.players.get(ann.id).unwrap();

        assert_eq!(fx.reconciler.sync_player(&ann).unwrap(), 1);
        let calls = (api.adds(), api.removes());
        assert_eq!(fx.reconciler.sync_player(&ann).unwrap(), 0);
        assert_eq!((api.adds(), api.removes()), calls);
    }

    #[test]
    fn unclassified_player_is_removed_from_lists() {
        let api = Arc::new(InMemoryVisibilityApi::new());
        let fx = build(api.clone(), true);
        assert!(fx.reconciler.initialize());
        let ann = fx.player("Ann Lee", 73);
        api.push_line(ListKind::White, "Ann Lee 73 Manual");

        assert_eq!(fx.reconciler.sync_player(&ann).unwrap(), 1);
        assert!(api.lines(ListKind::White).is_empty());
    }

    #[test]
    fn disabled_or_outdated_tool_is_unavailable() {
        let fx = build(Arc::new(InMemoryVisibilityApi::new()), false);
        assert!(!fx.reconciler.initialize());
        let ann = fx.player("Ann Lee", 73);
        assert!(matches!(
            fx.reconciler.sync_player(&ann),
            Err(VisibilityError::Unavailable)
        ));

        let api = Arc::new(InMemoryVisibilityApi::with_version("2"));
        api.push_line(ListKind::Void, "Jane Doe 123 PlayerTrack");
        let fx = build(api, true);
        assert!(!fx.reconciler.initialize());
        assert!(fx.players.is_empty());
    }

    /// Blocks the first `entries` call after `arm` until released.
    struct GatedApi {
        inner: InMemoryVisibilityApi,
        gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl GatedApi {
        fn arm(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            *self.gate.lock().unwrap() = Some((entered_tx, release_rx));
            (entered_rx, release_tx)
        }
    }

    impl VisibilityApi for GatedApi {
        fn api_version(&self) -> VisibilityResult<String> {
            self.inner.api_version()
        }

        fn entries(&self, list: ListKind) -> VisibilityResult<Vec<String>> {
            let gate = self
                .gate
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some((entered, release)) = gate {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            self.inner.entries(list)
        }

        fn add(
            &self,
            list: ListKind,
            name: &str,
            world_id: WorldId,
            reason: &str,
        ) -> VisibilityResult<()> {
            self.inner.add(list, name, world_id, reason)
        }

        fn remove(&self, list: ListKind, name: &str, world_id: WorldId) -> VisibilityResult<()> {
            self.inner.remove(list, name, world_id)
        }
    }

    #[test]
    fn overlapping_category_sync_is_dropped() {
        let api = Arc::new(GatedApi {
            inner: InMemoryVisibilityApi::new(),
            gate: Mutex::new(None),
        });
        let fx = build(api.clone(), true);
        assert!(fx.reconciler.initialize());
        let ann = fx.player("Ann Lee", 73);
        let category = fx.void_category(&ann);

        let (entered, release) = api.arm();
        let first = {
            let reconciler = Arc::clone(&fx.reconciler);
            std::thread::spawn(move || reconciler.sync_category(category))
        };
        entered.recv().unwrap();

        assert!(matches!(
            fx.reconciler.sync_category(category),
            Err(VisibilityError::AlreadySyncing)
        ));
        release.send(()).unwrap();
        assert_eq!(first.join().unwrap().unwrap(), 1);

        // The flag is released, including on the not-found path.
        assert_eq!(fx.reconciler.sync_category(CategoryId(999)).unwrap(), 0);
        assert_eq!(fx.reconciler.sync_category(category).unwrap(), 0);
    }

    /// Fails adds for one name and every read of the white list while
    /// `failing` is set.
    struct FlakyApi {
        inner: InMemoryVisibilityApi,
        failing: AtomicBool,
        bad_name: &'static str,
    }

    impl FlakyApi {
        fn broken(&self, call: &'static str) -> VisibilityError {
            VisibilityError::Api {
                call,
                message: "injected failure".into(),
            }
        }
    }

    impl VisibilityApi for FlakyApi {
        fn api_version(&self) -> VisibilityResult<String> {
            self.inner.api_version()
        }

        fn entries(&self, list: ListKind) -> VisibilityResult<Vec<String>> {
            if list == ListKind::White && self.failing.load(Ordering::SeqCst) {
                return Err(self.broken("entries"));
            }
            self.inner.entries(list)
        }

        fn add(
            &self,
            list: ListKind,
            name: &str,
            world_id: WorldId,
            reason: &str,
        ) -> VisibilityResult<()> {
            if name == self.bad_name && self.failing.load(Ordering::SeqCst) {
                return Err(self.broken("add"));
            }
            self.inner.add(list, name, world_id, reason)
        }

        fn remove(&self, list: ListKind, name: &str, world_id: WorldId) -> VisibilityResult<()> {
            self.inner.remove(list, name, world_id)
        }
    }

    #[test]
    fn full_sync_skips_failed_calls_and_finishes() {
        let api = Arc::new(FlakyApi {
            inner: InMemoryVisibilityApi::new(),
            failing: AtomicBool::new(false),
            bad_name: "Ann Lee",
        });
        let fx = build(api.clone(), true);
        assert!(fx.reconciler.initialize());

        let ann = fx.player("Ann Lee", 73);
        let bo = fx.player("Bo Kim", 73);
        let hidden = fx.void_category(&ann);
        fx.players
            .assign_categories(&[bo.id], &[hidden], &fx.categories.resolver())
            .unwrap();
        api.inner.push_line(ListKind::Void, "Cy Ode 74 Manual");
        api.failing.store(true, Ordering::SeqCst);

        let report = fx.reconciler.full_sync().unwrap();
        // One white-list read per step, plus Ann's add.
        assert_eq!(report.failures, 4);
        assert_eq!(report.added, 1);
        assert_eq!(report.players_created, 1);
        assert_eq!(report.overrides_applied, 1);
        assert_eq!(
            api.inner.lines(ListKind::Void),
            vec!["Cy Ode 74 Manual", "Bo Kim 73 PlayerTrack"]
        );
        let cy = fx.players.find_by_key("CY_ODE_74").unwrap();
        assert_eq!(cy.config.visibility.value, VisibilityType::Void);

        // The next run picks up what the failed one skipped.
        api.failing.store(false, Ordering::SeqCst);
        let healed = fx.reconciler.full_sync().unwrap();
        assert_eq!(
            healed,
            FullSyncReport {
                added: 1,
                ..FullSyncReport::default()
            }
        );
        assert_eq!(api.inner.lines(ListKind::Void).len(), 3);
    }

    #[test]
    fn category_sync_continues_past_a_failing_player() {
        let api = Arc::new(FlakyApi {
            inner: InMemoryVisibilityApi::new(),
            failing: AtomicBool::new(false),
            bad_name: "Ann Lee",
        });
        let fx = build(api.clone(), true);
        assert!(fx.reconciler.initialize());
        let ann = fx.player("Ann Lee", 73);
        let bo = fx.player("Bo Kim", 73);
        let hidden = fx.void_category(&ann);
        fx.players
            .assign_categories(&[bo.id], &[hidden], &fx.categories.resolver())
            .unwrap();
        api.failing.store(true, Ordering::SeqCst);

        assert_eq!(fx.reconciler.sync_category(hidden).unwrap(), 1);
        assert_eq!(api.inner.lines(ListKind::Void), vec!["Bo Kim 73 PlayerTrack"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn listener_syncs_on_category_config_change() {
        let api = Arc::new(InMemoryVisibilityApi::new());
        let fx = build(api.clone(), true);
        assert!(fx.reconciler.initialize());
        let ann = fx.player("Ann Lee", 73);
        let category = fx.categories.create("Hidden", None).unwrap();
        fx.players
            .assign_categories(&[ann.id], &[category.id], &fx.categories.resolver())
            .unwrap();

        let stream = fx.hub.subscribe(VisibilityReconciler::notification_filter());
        let listener = tokio::spawn(Arc::clone(&fx.reconciler).run(stream));

        let mut config = PlayerConfig::new(PlayerConfigKind::Category);
        config.visibility.set(VisibilityType::Void);
        fx.categories.update_config(category.id, &config).unwrap();

        for _ in 0..200 {
            if api.adds() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(api.lines(ListKind::Void), vec!["Ann Lee 73 PlayerTrack"]);
        listener.abort();
    }
}
