//! Social list membership reconciliation.
//!
//! A snapshot is one observed page of a roster. Reconciling it brings the
//! persisted member rows, the tracked players and the list's dynamic
//! category in line with what was observed. Each store call commits on its
//! own; a failed write is logged and the pass moves on, so the next snapshot
//! for the list repairs whatever was missed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use ptrack_domain::{CategoryStore, ConfigResolver, PlayerDirectory};
use ptrack_fabric::TaskQueue;
use ptrack_store::SharedStore;
use ptrack_types::{
    Category, CategoryId, ContentId, MembersSnapshot, Player, PlayerId, SnapshotMember,
    SocialList, SocialListId, SocialListKey, SocialListMember, SocialListMemberId,
};

use crate::error::{SocialError, SocialResult};
use crate::identity::{LocalCharacter, LocalIdentity};
use crate::locks::IdentityLocks;
use crate::naming::category_name;

/// What one reconciliation pass changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub list_id: SocialListId,
    pub list_created: bool,
    pub members_added: usize,
    pub members_updated: usize,
    pub members_removed: usize,
    pub players_created: usize,
    pub players_backfilled: usize,
    pub players_resolved: usize,
    pub players_unassigned: usize,
    pub links_created: usize,
    pub dynamic_category: Option<CategoryId>,
    pub dynamic_category_created: bool,
    pub dynamic_category_deleted: bool,
}

/// Folds roster snapshots into persisted social lists, players and
/// dynamic categories.
pub struct SocialListReconciler {
    store: SharedStore,
    categories: Arc<CategoryStore>,
    players: Arc<PlayerDirectory>,
    identity: Arc<dyn LocalIdentity>,
    queue: TaskQueue,
    locks: IdentityLocks,
}

impl SocialListReconciler {
    /// Wire the reconciler to its collaborators. Jobs go through `queue`.
    pub fn new(
        store: SharedStore,
        categories: Arc<CategoryStore>,
        players: Arc<PlayerDirectory>,
        identity: Arc<dyn LocalIdentity>,
        queue: TaskQueue,
    ) -> Self {
        Self {
            store,
            categories,
            players,
            identity,
            queue,
            locks: IdentityLocks::new(),
        }
    }

    /// Accept a snapshot from the roster source.
    ///
    /// The owning character is resolved on the calling thread; everything
    /// else runs as a background job. Returns once the job is queued.
    pub fn handle_snapshot(self: &Arc<Self>, snapshot: MembersSnapshot) -> SocialResult<()> {
        let owner = self.owner()?;
        let label = format!(
            "social-list {} page {}",
            snapshot.list_type.abbreviation(),
            snapshot.page
        );
        let this = Arc::clone(self);
        self.queue.submit(label, move || -> anyhow::Result<()> {
            let report = this.reconcile(&owner, snapshot)?;
            debug!(?report, "snapshot reconciled");
            Ok(())
        })?;
        Ok(())
    }

    /// Reconcile one snapshot owned by `owner`, synchronously.
    ///
    /// Snapshots for the same list identity are serialized.
    pub fn reconcile(
        &self,
        owner: &LocalCharacter,
        snapshot: MembersSnapshot,
    ) -> SocialResult<ReconcileReport> {
        let key = SocialListKey::new(
            owner.content_id,
            snapshot.list_type,
            snapshot.list_number,
            owner.data_center_id,
        );
        let lock = self.locks.lock_for(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut report = ReconcileReport::default();
        let list = self.resolve_list(key, &snapshot, &mut report)?;
        report.list_id = list.id;

        let incoming = incoming_members(owner.content_id, snapshot.members);
        let page = snapshot.page;
        self.diff_members(&list, &incoming, page, &mut report)?;
        self.remove_absent(&list, &incoming, page, &mut report)?;
        if list.list_type.is_paged() && list.page_count > 0 {
            self.remove_beyond_page_count(&list, &mut report)?;
        }

        // User settings on the list may have changed while members were
        // being written.
        let Some(list) = self.store.get_social_list(list.id)? else {
            warn!(list_id = %report.list_id, "social list removed during reconciliation");
            return Ok(report);
        };
        let members = self.store.list_members(list.id)?;

        let resolver = self.categories.resolver();
        let resolved = self.resolve_players(&list, &members, &resolver, &mut report);
        report.players_resolved = resolved.len();

        let mut assign = Vec::new();
        if let Some(category) = self.sync_dynamic_category(owner, &list, &resolved, &mut report)? {
            assign.push(category);
        }
        if let Some(default) = list.default_category_id {
            assign.push(default);
        }

        if !assign.is_empty() && !resolved.is_empty() {
            let resolver = self.categories.resolver();
            match self.players.assign_categories(&resolved, &assign, &resolver) {
                Ok(links) => report.links_created = links,
                Err(e) => {
                    error!(list_id = %list.id, error = %e, "failed to assign list categories");
                }
            }
        }

        debug!(
            list_id = %list.id,
            added = report.members_added,
            updated = report.members_updated,
            removed = report.members_removed,
            resolved = report.players_resolved,
            "social list reconciled"
        );
        Ok(report)
    }

    fn owner(&self) -> SocialResult<LocalCharacter> {
        let Some(owner) = self.identity.current() else {
            warn!("snapshot ignored: no character logged in");
            return Err(SocialError::IdentityUnavailable("no character logged in"));
        };
        if !owner.content_id.is_known() {
            warn!("snapshot ignored: local content id is 0");
            return Err(SocialError::IdentityUnavailable("local content id is 0"));
        }
        if owner.data_center_id == 0 {
            warn!(world = owner.home_world, "snapshot ignored: home data center unknown");
            return Err(SocialError::IdentityUnavailable("home data center unknown"));
        }
        Ok(owner)
    }

    fn resolve_list(
        &self,
        key: SocialListKey,
        snapshot: &MembersSnapshot,
        report: &mut ReconcileReport,
    ) -> SocialResult<SocialList> {
        let now = Utc::now().timestamp();
        let paged = key.list_type.is_paged();

        if let Some(mut list) = self.store.find_social_list(&key)? {
            if paged {
                list.page_last_updated.insert(snapshot.page, now);
                list.page_count = snapshot.page_count;
                list.updated = now;
                match self.store.update_social_list(&list) {
                    Ok(true) => {}
                    Ok(false) => warn!(list_id = %list.id, "page bookkeeping not applied"),
                    Err(e) => error!(list_id = %list.id, error = %e, "failed to save page bookkeeping"),
                }
            }
            return Ok(list);
        }

        let mut list = SocialList::new(key);
        list.created = now;
        list.updated = now;
        if paged {
            list.page_last_updated.insert(snapshot.page, now);
            list.page_count = snapshot.page_count;
        }
        list.id = self.store.create_social_list(&list).map_err(|source| {
            error!(%key, error = %source, "failed to create social list");
            SocialError::ListCreateFailed { key, source }
        })?;
        report.list_created = true;
        info!(list_id = %list.id, %key, "social list created");
        Ok(list)
    }

    /// Update members whose name, world or page changed and insert new ones.
    /// Matching runs against every member of the list, not just this page.
    fn diff_members(
        &self,
        list: &SocialList,
        incoming: &[SnapshotMember],
        page: u16,
        report: &mut ReconcileReport,
    ) -> SocialResult<()> {
        let existing = self.store.list_members(list.id)?;
        let by_content_id: HashMap<ContentId, &SocialListMember> =
            existing.iter().map(|m| (m.content_id, m)).collect();
        let paged = list.list_type.is_paged();

        let mut added = Vec::new();
        for member in incoming {
            let Some(current) = by_content_id.get(&member.content_id) else {
                added.push(SocialListMember::from_snapshot(list.id, member, page));
                continue;
            };
            let key = member.key();
            let moved = paged && current.page_number != page;
            if current.key == key && !moved {
                continue;
            }
            let mut changed = SocialListMember::clone(current);
            changed.key = key;
            changed.name = member.name.clone();
            changed.world_id = member.world_id;
            changed.page_number = page;
            match self.store.update_member(&changed) {
                Ok(true) => report.members_updated += 1,
                Ok(false) => warn!(member = %changed.id, "member update not applied"),
                Err(e) => error!(member = %changed.id, error = %e, "failed to update member"),
            }
        }

        if !added.is_empty() {
            match self.store.create_members(&added) {
                Ok(ids) => report.members_added += ids.len(),
                Err(e) => error!(list_id = %list.id, error = %e, "failed to insert members"),
            }
        }
        Ok(())
    }

    /// Delete members of this page that the snapshot no longer lists.
    fn remove_absent(
        &self,
        list: &SocialList,
        incoming: &[SnapshotMember],
        page: u16,
        report: &mut ReconcileReport,
    ) -> SocialResult<()> {
        let present: HashSet<ContentId> = incoming.iter().map(|m| m.content_id).collect();
        let stale: Vec<_> = self
            .store
            .list_members_on_page(list.id, page)?
            .into_iter()
            .filter(|m| !present.contains(&m.content_id))
            .map(|m| m.id)
            .collect();
        self.delete_members(list, &stale, "absent from snapshot", report);
        Ok(())
    }

    fn remove_beyond_page_count(
        &self,
        list: &SocialList,
        report: &mut ReconcileReport,
    ) -> SocialResult<()> {
        let stale: Vec<_> = self
            .store
            .list_members(list.id)?
            .into_iter()
            .filter(|m| m.page_number > list.page_count)
            .map(|m| m.id)
            .collect();
        self.delete_members(list, &stale, "page no longer exists", report);
        Ok(())
    }

    fn delete_members(
        &self,
        list: &SocialList,
        ids: &[SocialListMemberId],
        reason: &str,
        report: &mut ReconcileReport,
    ) {
        if ids.is_empty() {
            return;
        }
        match self.store.delete_members(ids) {
            Ok(removed) => {
                report.members_removed += removed;
                debug!(list_id = %list.id, removed, reason, "members removed");
            }
            Err(e) => error!(list_id = %list.id, error = %e, reason, "failed to remove members"),
        }
    }

    /// Match every member to a tracked player, creating or backfilling as
    /// the list allows. Returns distinct player ids in member order.
    fn resolve_players(
        &self,
        list: &SocialList,
        members: &[SocialListMember],
        resolver: &ConfigResolver,
        report: &mut ReconcileReport,
    ) -> Vec<PlayerId> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();
        for member in members {
            let player = match self
                .players
                .find(member.content_id, &member.name, member.world_id)
            {
                Some(player) => Some(self.backfill(player, member, resolver, report)),
                None if list.add_players => self.create_player(member, resolver, report),
                None => None,
            };
            if let Some(player) = player {
                if seen.insert(player.id) {
                    resolved.push(player.id);
                }
            }
        }
        resolved
    }

    fn backfill(
        &self,
        mut player: Player,
        member: &SocialListMember,
        resolver: &ConfigResolver,
        report: &mut ReconcileReport,
    ) -> Player {
        if player.content_id.is_known() || !member.content_id.is_known() {
            return player;
        }
        player.content_id = member.content_id;
        match self.players.update(&player, resolver) {
            Ok(true) => {
                report.players_backfilled += 1;
                debug!(player_id = %player.id, content_id = %member.content_id, "content id backfilled");
            }
            Ok(false) => warn!(player_id = %player.id, "content id backfill not applied"),
            Err(e) => error!(player_id = %player.id, error = %e, "failed to backfill content id"),
        }
        player
    }

    fn create_player(
        &self,
        member: &SocialListMember,
        resolver: &ConfigResolver,
        report: &mut ReconcileReport,
    ) -> Option<Player> {
        if member.name.is_empty() {
            debug!(content_id = %member.content_id, "member has no name yet, not tracked");
            return None;
        }
        match self
            .players
            .create(&member.name, member.world_id, member.content_id, resolver)
        {
            Ok(player) => {
                report.players_created += 1;
                Some(player)
            }
            Err(e) => {
                error!(key = %member.key, error = %e, "failed to create player for member");
                None
            }
        }
    }

    /// Keep the list's dynamic category in step with its sync setting.
    /// Returns the category to assign when sync is on.
    fn sync_dynamic_category(
        &self,
        owner: &LocalCharacter,
        list: &SocialList,
        resolved: &[PlayerId],
        report: &mut ReconcileReport,
    ) -> SocialResult<Option<CategoryId>> {
        let synced = self.categories.synced_category(list.id);

        if !list.sync_with_category {
            if let Some(category) = synced {
                match self.categories.delete(category.id) {
                    Ok(deleted) => report.dynamic_category_deleted = deleted,
                    Err(e) => {
                        error!(category = %category.id, error = %e, "failed to delete unsynced category");
                    }
                }
            }
            return Ok(None);
        }

        let category = match synced {
            Some(category) => category,
            None => {
                let name = category_name(list.list_type, list.list_number, &owner.name);
                let category = self.categories.create(&name, Some(list.id))?;
                report.dynamic_category_created = true;
                info!(category = %category.id, list_id = %list.id, %name, "dynamic category created");
                category
            }
        };
        report.dynamic_category = Some(category.id);

        let keep: HashSet<PlayerId> = resolved.iter().copied().collect();
        let resolver = self.categories.resolver();
        for player in self.players.category_players(category.id) {
            if keep.contains(&player.id) {
                continue;
            }
            match self.players.unassign_category(player.id, category.id, &resolver) {
                Ok(true) => {
                    report.players_unassigned += 1;
                    debug!(player_id = %player.id, category = %category.id, "left dynamic category");
                }
                Ok(false) => {}
                Err(e) => {
                    error!(player_id = %player.id, error = %e, "failed to unassign dynamic category");
                }
            }
        }
        Ok(Some(category.id))
    }

    // ---- Management ----

    /// Every social list owned by `owner`.
    pub fn social_lists(&self, owner: ContentId) -> SocialResult<Vec<SocialList>> {
        Ok(self.store.list_social_lists(owner)?)
    }

    /// Insert `list` when it has no id yet, else save its settings. Returns
    /// the list's id.
    pub fn save_social_list(&self, list: &SocialList) -> SocialResult<SocialListId> {
        if list.id == SocialListId(0) {
            let id = self.store.create_social_list(list)?;
            info!(list_id = %id, key = %list.key(), "social list added");
            return Ok(id);
        }
        if !self.store.update_social_list(list)? {
            warn!(list_id = %list.id, "social list update not applied");
        }
        Ok(list.id)
    }

    /// Delete the dynamic category linked to `list`, if there is one.
    pub fn delete_synced_category(&self, list: SocialListId) -> SocialResult<bool> {
        match self.categories.synced_category(list) {
            Some(category) => Ok(self.categories.delete(category.id)?),
            None => Ok(false),
        }
    }

    /// Delete every list owned by `owner` together with its members and
    /// dynamic category. Returns the number of lists removed.
    pub fn delete_social_lists(&self, owner: ContentId) -> SocialResult<usize> {
        let lists = self.store.list_social_lists(owner)?;
        let mut removed = 0;
        for list in &lists {
            let key = list.key();
            let lock = self.locks.lock_for(key);
            {
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                self.delete_synced_category(list.id)?;
                let members = self.store.delete_all_members(list.id)?;
                if self.store.delete_social_list(list.id)? {
                    removed += 1;
                }
                debug!(list_id = %list.id, members, "social list deleted");
            }
            self.locks.remove(&key);
        }
        info!(%owner, removed, "social lists deleted");
        Ok(removed)
    }

    /// Rename a dynamic category back to its derived name. The name is left
    /// alone when the owning character is unknown.
    pub fn reset_category_name(&self, id: CategoryId) -> SocialResult<Category> {
        let mut category = self
            .categories
            .get(id)
            .ok_or(ptrack_domain::DomainError::CategoryNotFound(id))?;
        let list_id = category.social_list_id.ok_or(SocialError::NotDynamic(id))?;
        let Some(list) = self.store.get_social_list(list_id)? else {
            warn!(category = %id, list_id = %list_id, "linked social list missing, name kept");
            return Ok(category);
        };
        let Some(owner) = self.identity.character(list.content_id) else {
            warn!(category = %id, owner = %list.content_id, "list owner unknown, name kept");
            return Ok(category);
        };
        category.name = category_name(list.list_type, list.list_number, &owner.name);
        self.categories.update(&category)?;
        Ok(category)
    }
}

impl std::fmt::Debug for SocialListReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialListReconciler")
            .field("queue", &self.queue)
            .field("locks", &self.locks.len())
            .finish()
    }
}

/// Drop the owner's own entry and repeated content ids, keeping the first.
fn incoming_members(owner: ContentId, members: Vec<SnapshotMember>) -> Vec<SnapshotMember> {
    let mut seen = HashSet::new();
    members
        .into_iter()
        .filter(|m| m.content_id != owner && seen.insert(m.content_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentity;
    use ptrack_domain::SettingsService;
    use ptrack_fabric::{NotificationHub, QueueConfig};
    use ptrack_store::{InMemoryStore, SocialListMemberRepo, SocialListRepo};
    use ptrack_types::SocialListType;
    use tokio::runtime::Handle;

    const JANE: ContentId = ContentId(900);

    struct Fixture {
        store: Arc<InMemoryStore>,
        players: Arc<PlayerDirectory>,
        categories: Arc<CategoryStore>,
        identity: Arc<StaticIdentity>,
        reconciler: Arc<SocialListReconciler>,
    }

    fn jane() -> LocalCharacter {
        LocalCharacter {
            content_id: JANE,
            name: "Jane Doe".into(),
            home_world: 73,
            data_center_id: 4,
        }
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let hub = Arc::new(NotificationHub::default());
        let settings = Arc::new(SettingsService::load(store.clone()).unwrap());
        let players = Arc::new(PlayerDirectory::new(store.clone(), hub.clone()));
        let categories = Arc::new(
            CategoryStore::load(store.clone(), players.clone(), settings, hub).unwrap(),
        );
        let identity = Arc::new(StaticIdentity::logged_in(jane()));
        let queue = TaskQueue::start(&Handle::current(), QueueConfig::default());
        let reconciler = Arc::new(SocialListReconciler::new(
            store.clone(),
            categories.clone(),
            players.clone(),
            identity.clone(),
            queue,
        ));
        Fixture {
            store,
            players,
            categories,
            identity,
            reconciler,
        }
    }

    fn member(id: u64, name: &str) -> SnapshotMember {
        SnapshotMember::new(id, name, 73)
    }

    fn friends(members: Vec<SnapshotMember>) -> MembersSnapshot {
        MembersSnapshot::new(SocialListType::FriendList, members)
    }

    impl Fixture {
        fn run(&self, snapshot: MembersSnapshot) -> ReconcileReport {
            self.reconciler.reconcile(&jane(), snapshot).unwrap()
        }

        /// Turn on category sync and player creation for a list.
        fn enable_sync(&self, list: SocialListId) {
            let mut list = self.store.get_social_list(list).unwrap().unwrap();
            list.sync_with_category = true;
            list.add_players = true;
            self.reconciler.save_social_list(&list).unwrap();
        }

        fn member_ids(&self, list: SocialListId) -> Vec<u64> {
            let mut ids: Vec<u64> = self
                .store
                .list_members(list)
                .unwrap()
                .iter()
                .map(|m| m.content_id.0)
                .collect();
            ids.sort_unstable();
            ids
        }
    }

    #[tokio::test]
    async fn identical_snapshot_writes_nothing() {
        let fx = fixture();
        let snapshot = friends(vec![member(1, "Ann Lee"), member(2, "Bo Kim")]);
        let first = fx.run(snapshot.clone());
        fx.enable_sync(first.list_id);
        fx.run(snapshot.clone());

        let writes = fx.store.writes();
        let report = fx.run(snapshot);
        assert_eq!(fx.store.writes(), writes);
        assert_eq!(report.members_added + report.members_updated + report.members_removed, 0);
        assert_eq!(report.links_created, 0);
        assert_eq!(report.players_resolved, 2);
    }

    #[tokio::test]
    async fn dropped_member_leaves_dynamic_category() {
        let fx = fixture();
        let first = fx.run(friends(vec![member(1, "Ann Lee"), member(2, "Bo Kim")]));
        fx.enable_sync(first.list_id);
        let synced = fx.run(friends(vec![member(1, "Ann Lee"), member(2, "Bo Kim")]));
        let category = synced.dynamic_category.unwrap();
        assert_eq!(fx.categories.get(category).unwrap().name, "FL [Jane Doe]");
        assert_eq!(fx.players.category_players(category).len(), 2);

        let report = fx.run(friends(vec![member(1, "Ann Lee")]));
        assert_eq!(report.members_removed, 1);
        assert_eq!(report.players_unassigned, 1);
        assert_eq!(fx.member_ids(first.list_id), vec![1]);

        let remaining = fx.players.category_players(category);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content_id, ContentId(1));
        assert!(fx.players.find_by_content_id(ContentId(2)).is_some());
    }

    #[tokio::test]
    async fn page_refresh_only_touches_its_page() {
        let fx = fixture();
        let fc = |page, members| {
            MembersSnapshot::new(SocialListType::FreeCompany, members).paged(page, 2)
        };
        let first = fx.run(fc(1, vec![member(1, "Ann Lee"), member(2, "Bo Kim")]));
        fx.run(fc(2, vec![member(3, "Cy Ode")]));
        assert_eq!(fx.member_ids(first.list_id), vec![1, 2, 3]);

        let report = fx.run(fc(1, vec![member(1, "Ann Lee")]));
        assert_eq!(report.members_removed, 1);
        assert_eq!(fx.member_ids(first.list_id), vec![1, 3]);

        let list = fx.store.get_social_list(first.list_id).unwrap().unwrap();
        assert_eq!(list.page_count, 2);
        assert_eq!(list.page_last_updated.len(), 2);
    }

    #[tokio::test]
    async fn shrinking_page_count_drops_trailing_pages() {
        let fx = fixture();
        let fc = |page, count, members| {
            MembersSnapshot::new(SocialListType::FreeCompany, members).paged(page, count)
        };
        let first = fx.run(fc(1, 3, vec![member(1, "Ann Lee")]));
        fx.run(fc(2, 3, vec![member(2, "Bo Kim")]));
        fx.run(fc(3, 3, vec![member(3, "Cy Ode")]));
        assert_eq!(fx.member_ids(first.list_id), vec![1, 2, 3]);

        fx.run(fc(1, 2, vec![member(1, "Ann Lee")]));
        assert_eq!(fx.member_ids(first.list_id), vec![1, 2]);
    }

    #[tokio::test]
    async fn member_moving_pages_is_updated_not_deleted() {
        let fx = fixture();
        let fc = |page, members| {
            MembersSnapshot::new(SocialListType::FreeCompany, members).paged(page, 2)
        };
        let first = fx.run(fc(1, vec![member(1, "Ann Lee"), member(2, "Bo Kim")]));
        let moved = fx.run(fc(2, vec![member(2, "Bo Kim")]));
        assert_eq!(moved.members_updated, 1);

        fx.run(fc(1, vec![member(1, "Ann Lee")]));
        assert_eq!(fx.member_ids(first.list_id), vec![1, 2]);
    }

    #[tokio::test]
    async fn renamed_member_is_updated_in_place() {
        let fx = fixture();
        let first = fx.run(friends(vec![member(1, "Ann Lee")]));
        let report = fx.run(friends(vec![SnapshotMember::new(1u64, "Ann Moss", 74)]));
        assert_eq!(report.members_updated, 1);

        let members = fx.store.list_members(first.list_id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].key, "ANN_MOSS_74");
        assert_eq!(members[0].world_id, 74);
    }

    #[tokio::test]
    async fn deleted_dynamic_category_comes_back() {
        let fx = fixture();
        let first = fx.run(friends(vec![member(1, "Ann Lee")]));
        fx.enable_sync(first.list_id);
        let original = fx.run(friends(vec![member(1, "Ann Lee")])).dynamic_category.unwrap();

        assert!(fx.categories.delete(original).unwrap());
        assert!(fx.categories.synced_category(first.list_id).is_none());

        let report = fx.run(friends(vec![member(1, "Ann Lee")]));
        assert!(report.dynamic_category_created);
        let recreated = fx.categories.synced_category(first.list_id).unwrap();
        assert_ne!(recreated.id, original);
        assert_eq!(fx.players.category_players(recreated.id).len(), 1);
    }

    #[tokio::test]
    async fn disabling_sync_deletes_dynamic_category() {
        let fx = fixture();
        let first = fx.run(friends(vec![member(1, "Ann Lee")]));
        fx.enable_sync(first.list_id);
        let category = fx.run(friends(vec![member(1, "Ann Lee")])).dynamic_category.unwrap();

        let mut list = fx.store.get_social_list(first.list_id).unwrap().unwrap();
        list.sync_with_category = false;
        fx.reconciler.save_social_list(&list).unwrap();

        let report = fx.run(friends(vec![member(1, "Ann Lee")]));
        assert!(report.dynamic_category_deleted);
        assert!(fx.categories.get(category).is_none());
    }

    #[tokio::test]
    async fn default_category_is_assigned() {
        let fx = fixture();
        let raid = fx.categories.create("Raid", None).unwrap();
        let first = fx.run(friends(vec![member(1, "Ann Lee")]));
        let mut list = fx.store.get_social_list(first.list_id).unwrap().unwrap();
        list.add_players = true;
        list.default_category_id = Some(raid.id);
        fx.reconciler.save_social_list(&list).unwrap();

        let report = fx.run(friends(vec![member(1, "Ann Lee")]));
        assert_eq!(report.links_created, 1);
        assert_eq!(fx.players.category_players(raid.id).len(), 1);
    }

    #[tokio::test]
    async fn failed_list_insert_aborts() {
        let fx = fixture();
        fx.store.set_read_only(true);
        let err = fx
            .reconciler
            .reconcile(&jane(), friends(vec![member(1, "Ann Lee")]))
            .unwrap_err();
        assert!(matches!(err, SocialError::ListCreateFailed { .. }));
        fx.store.set_read_only(false);
        assert!(fx.reconciler.social_lists(JANE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_is_never_a_member() {
        let fx = fixture();
        let report = fx.run(friends(vec![
            SnapshotMember::new(JANE, "Jane Doe", 73),
            member(1, "Ann Lee"),
            member(1, "Ann Lee"),
        ]));
        assert_eq!(report.members_added, 1);
        assert_eq!(fx.member_ids(report.list_id), vec![1]);
    }

    #[tokio::test]
    async fn unnamed_members_are_not_tracked() {
        let fx = fixture();
        let first = fx.run(friends(vec![member(1, ""), member(2, "Bo Kim")]));
        fx.enable_sync(first.list_id);

        let report = fx.run(friends(vec![member(1, ""), member(2, "Bo Kim")]));
        assert_eq!(report.players_created, 1);
        assert!(fx.players.find_by_content_id(ContentId(1)).is_none());
        assert_eq!(fx.member_ids(first.list_id), vec![1, 2]);
    }

    #[tokio::test]
    async fn known_player_gets_content_id_backfilled() {
        let fx = fixture();
        let resolver = fx.categories.resolver();
        let ann = fx
            .players
            .create("Ann Lee", 73, ContentId::UNKNOWN, &resolver)
            .unwrap();

        let report = fx.run(friends(vec![member(1, "Ann Lee")]));
        assert_eq!(report.players_backfilled, 1);
        assert_eq!(report.players_created, 0);
        assert_eq!(fx.players.get(ann.id).unwrap().content_id, ContentId(1));
    }

    #[tokio::test]
    async fn numbered_lists_are_separate() {
        let fx = fixture();
        let ls = |n| {
            MembersSnapshot::new(SocialListType::LinkShell, vec![member(1, "Ann Lee")]).numbered(n)
        };
        let first = fx.run(ls(1));
        let second = fx.run(ls(2));
        assert_ne!(first.list_id, second.list_id);
        assert!(!fx.run(ls(2)).list_created);

        // Friend lists ignore the number.
        assert!(fx.run(friends(vec![]).numbered(1)).list_created);
        assert!(!fx.run(friends(vec![]).numbered(7)).list_created);
        assert_eq!(fx.reconciler.social_lists(JANE).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn reset_and_delete_management() {
        let fx = fixture();
        let first = fx.run(friends(vec![member(1, "Ann Lee")]));
        fx.enable_sync(first.list_id);
        let category = fx.run(friends(vec![member(1, "Ann Lee")])).dynamic_category.unwrap();

        let mut renamed = fx.categories.get(category).unwrap();
        renamed.name = "Pals".into();
        fx.categories.update(&renamed).unwrap();
        let reset = fx.reconciler.reset_category_name(category).unwrap();
        assert_eq!(reset.name, "FL [Jane Doe]");
        assert_eq!(fx.categories.get(category).unwrap().name, "FL [Jane Doe]");

        let plain = fx.categories.create("Plain", None).unwrap();
        assert!(matches!(
            fx.reconciler.reset_category_name(plain.id),
            Err(SocialError::NotDynamic(_))
        ));

        assert_eq!(fx.reconciler.locks.len(), 1);
        assert_eq!(fx.reconciler.delete_social_lists(JANE).unwrap(), 1);
        assert!(fx.reconciler.locks.is_empty());
        assert!(fx.categories.get(category).is_none());
        assert!(fx.store.list_members(first.list_id).unwrap().is_empty());
        assert!(fx.reconciler.social_lists(JANE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn logged_out_snapshot_is_rejected() {
        let fx = fixture();
        fx.identity.log_out();
        let err = fx
            .reconciler
            .handle_snapshot(friends(vec![member(1, "Ann Lee")]))
            .unwrap_err();
        assert!(matches!(err, SocialError::IdentityUnavailable(_)));
        assert_eq!(fx.store.writes(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn handle_snapshot_runs_in_background() {
        let fx = fixture();
        for page in 1..=3u16 {
            let snapshot = MembersSnapshot::new(
                SocialListType::FreeCompany,
                vec![member(u64::from(page), "Ann Lee")],
            )
            .paged(page, 3);
            fx.reconciler.handle_snapshot(snapshot).unwrap();
        }
        fx.reconciler.queue.wait_idle().await;

        let lists = fx.reconciler.social_lists(JANE).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(fx.member_ids(lists[0].id), vec![1, 2, 3]);
    }
}
