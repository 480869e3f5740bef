use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

use ptrack_domain::{CategoryStore, PlayerDirectory, SettingsService, TagStore};
use ptrack_fabric::{NotificationHub, TaskQueue};
use ptrack_social::{LocalIdentity, SocialListReconciler, StaticIdentity};
use ptrack_store::{InMemoryStore, SharedStore};
use ptrack_types::MembersSnapshot;
use ptrack_visibility::{InMemoryVisibilityApi, VisibilityApi, VisibilityReconciler};

use crate::config::TrackerConfig;
use crate::error::SdkResult;

/// Every PlayerTrack service, wired together.
///
/// Services reach each other only through the handles passed in here.
pub struct Tracker {
    config: TrackerConfig,
    store: SharedStore,
    hub: Arc<NotificationHub>,
    queue: TaskQueue,
    settings: Arc<SettingsService>,
    players: Arc<PlayerDirectory>,
    categories: Arc<CategoryStore>,
    tags: Arc<TagStore>,
    social: Arc<SocialListReconciler>,
    visibility: Arc<VisibilityReconciler>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Tracker {
    /// Load every cache from `store` and start the background queue on
    /// `handle`.
    pub fn open(
        config: TrackerConfig,
        store: SharedStore,
        identity: Arc<dyn LocalIdentity>,
        visibility_api: Arc<dyn VisibilityApi>,
        handle: &Handle,
    ) -> SdkResult<Self> {
        let hub = Arc::new(NotificationHub::new(config.notification_capacity));
        let queue = TaskQueue::start(handle, config.queue.clone());

        let settings = Arc::new(SettingsService::load(Arc::clone(&store))?);
        let players = Arc::new(PlayerDirectory::new(Arc::clone(&store), Arc::clone(&hub)));
        let categories = Arc::new(CategoryStore::load(
            Arc::clone(&store),
            Arc::clone(&players),
            Arc::clone(&settings),
            Arc::clone(&hub),
        )?);
        players.load(&categories.resolver())?;
        let tags = Arc::new(TagStore::load(
            Arc::clone(&store),
            Arc::clone(&players),
            Arc::clone(&hub),
        )?);

        let social = Arc::new(SocialListReconciler::new(
            Arc::clone(&store),
            Arc::clone(&categories),
            Arc::clone(&players),
            identity,
            queue.clone(),
        ));
        let visibility = Arc::new(VisibilityReconciler::new(
            Arc::clone(&players),
            Arc::clone(&categories),
            Arc::clone(&settings),
            visibility_api,
            config.visibility_reason.clone(),
        ));

        info!(players = players.len(), "tracker opened");
        Ok(Self {
            config,
            store,
            hub,
            queue,
            settings,
            players,
            categories,
            tags,
            social,
            visibility,
            listener: Mutex::new(None),
        })
    }

    /// A tracker on an empty in-memory store, logged in as the configured
    /// identity if there is one.
    pub fn in_memory(config: TrackerConfig, handle: &Handle) -> SdkResult<Self> {
        let identity = match &config.identity {
            Some(character) => StaticIdentity::logged_in(character.clone()),
            None => StaticIdentity::new(),
        };
        Self::open(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(identity),
            Arc::new(InMemoryVisibilityApi::new()),
            handle,
        )
    }

    /// Initialise the visibility integration and, when it is available,
    /// start listening for changes. Returns whether it is available.
    pub fn start_visibility(&self, handle: &Handle) -> bool {
        if !self.visibility.initialize() {
            return false;
        }
        let stream = self
            .hub
            .subscribe(VisibilityReconciler::notification_filter());
        let task = handle.spawn(Arc::clone(&self.visibility).run(stream));
        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        true
    }

    /// Queue a roster snapshot for reconciliation.
    pub fn handle_snapshot(&self, snapshot: MembersSnapshot) -> SdkResult<()> {
        Ok(self.social.handle_snapshot(snapshot)?)
    }

    /// Wait until every queued reconciliation has finished.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    /// Runtime configuration the tracker was opened with.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Backing store.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Hub every service publishes to.
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub fn settings(&self) -> &Arc<SettingsService> {
        &self.settings
    }

    pub fn players(&self) -> &Arc<PlayerDirectory> {
        &self.players
    }

    pub fn categories(&self) -> &Arc<CategoryStore> {
        &self.categories
    }

    pub fn tags(&self) -> &Arc<TagStore> {
        &self.tags
    }

    pub fn social(&self) -> &Arc<SocialListReconciler> {
        &self.social
    }

    pub fn visibility(&self) -> &Arc<VisibilityReconciler> {
        &self.visibility
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        let listener = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = listener {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("players", &self.players)
            .field("categories", &self.categories)
            .field("tags", &self.tags)
            .field("queue", &self.queue)
            .finish()
    }
}
