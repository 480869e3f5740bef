//! Boundary to the external visibility tool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use ptrack_types::WorldId;

use crate::entry::{ListKind, VisibilityEntry};
use crate::error::{VisibilityError, VisibilityResult};

/// API version the reconciler speaks.
pub const REQUIRED_API_VERSION: &str = "1";

/// String-based API of the external tool. Entries come back as raw lines;
/// see [`crate::entry`] for the format.
pub trait VisibilityApi: Send + Sync {
    fn api_version(&self) -> VisibilityResult<String>;

    fn entries(&self, list: ListKind) -> VisibilityResult<Vec<String>>;

    fn add(&self, list: ListKind, name: &str, world_id: WorldId, reason: &str)
        -> VisibilityResult<()>;

    fn remove(&self, list: ListKind, name: &str, world_id: WorldId) -> VisibilityResult<()>;

    /// True when the tool answers with [`REQUIRED_API_VERSION`].
    fn is_available(&self) -> bool {
        matches!(self.api_version(), Ok(v) if v == REQUIRED_API_VERSION)
    }
}

/// In-process stand-in for the external tool. Counts add and remove calls.
#[derive(Debug)]
pub struct InMemoryVisibilityApi {
    version: String,
    online: AtomicBool,
    lists: RwLock<HashMap<ListKind, Vec<String>>>,
    adds: AtomicUsize,
    removes: AtomicUsize,
}

impl InMemoryVisibilityApi {
    pub fn new() -> Self {
        Self::with_version(REQUIRED_API_VERSION)
    }

    /// Stand-in that reports `version` from `api_version`.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            online: AtomicBool::new(true),
            lists: RwLock::new(HashMap::new()),
            adds: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
        }
    }

    /// Seed a raw line without counting it as an add.
    pub fn push_line(&self, list: ListKind, line: impl Into<String>) {
        self.lists
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(list)
            .or_default()
            .push(line.into());
    }

    /// When offline every call fails.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Add calls made so far.
    pub fn adds(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    /// Remove calls made so far.
    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    /// Raw lines currently in `list`.
    pub fn lines(&self, list: ListKind) -> Vec<String> {
        self.lists
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&list)
            .cloned()
            .unwrap_or_default()
    }

    fn check_online(&self, call: &'static str) -> VisibilityResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VisibilityError::Api {
                call,
                message: "tool not loaded".into(),
            })
        }
    }
}

impl Default for InMemoryVisibilityApi {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityApi for InMemoryVisibilityApi {
    fn api_version(&self) -> VisibilityResult<String> {
        self.check_online("api_version")?;
        Ok(self.version.clone())
    }

    fn entries(&self, list: ListKind) -> VisibilityResult<Vec<String>> {
        self.check_online("entries")?;
        Ok(self.lines(list))
    }

    fn add(
        &self,
        list: ListKind,
        name: &str,
        world_id: WorldId,
        reason: &str,
    ) -> VisibilityResult<()> {
        self.check_online("add")?;
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.push_line(list, format!("{name} {world_id} {reason}"));
        Ok(())
    }

    fn remove(&self, list: ListKind, name: &str, world_id: WorldId) -> VisibilityResult<()> {
        self.check_online("remove")?;
        self.removes.fetch_add(1, Ordering::SeqCst);
        let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(lines) = lists.get_mut(&list) {
            lines.retain(|line| match line.parse::<VisibilityEntry>() {
                Ok(entry) => !(entry.name == name && entry.world_id == world_id),
                Err(_) => true,
            });
        }
        Ok(())
    }
}
