//! State shared between the cache and the handles it hands out.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tix_config::ConfigCache;
use tix_entity::{Bug, Identity};
use tix_repo::Repository;
use tix_types::EntityId;

use crate::error::{CacheError, CacheResult};
use crate::excerpt::{BugExcerpt, IdentityExcerpt};
use crate::index::{self, BUG_INDEX, IDENTITY_INDEX};

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct CacheState {
    pub repo: Arc<Repository>,
    /// `None` for a repository without a metadata directory; nothing is
    /// persisted then.
    pub cache_dir: Option<PathBuf>,
    pub bug_excerpts: RwLock<BTreeMap<EntityId, BugExcerpt>>,
    pub identity_excerpts: RwLock<BTreeMap<EntityId, IdentityExcerpt>>,
    pub config: RwLock<ConfigCache>,
    /// Serializes index writes so the last file written holds every update.
    persist: Mutex<()>,
}

impl CacheState {
    pub fn new(repo: Arc<Repository>, cache_dir: Option<PathBuf>, config: ConfigCache) -> Self {
        Self {
            repo,
            cache_dir,
            bug_excerpts: RwLock::new(BTreeMap::new()),
            identity_excerpts: RwLock::new(BTreeMap::new()),
            config: RwLock::new(config),
            persist: Mutex::new(()),
        }
    }

    pub fn user(&self) -> CacheResult<EntityId> {
        self.repo.user_identity().ok_or(CacheError::NoUserIdentity)
    }

    pub fn bug_updated(&self, bug: &Bug) -> CacheResult<()> {
        let excerpt = BugExcerpt::new(bug, &bug.compile());
        write(&self.bug_excerpts).insert(excerpt.id, excerpt);
        self.persist_bugs()
    }

    pub fn identity_updated(&self, identity: &Identity) -> CacheResult<()> {
        let excerpt = IdentityExcerpt::new(identity);
        write(&self.identity_excerpts).insert(excerpt.id, excerpt);
        self.persist_identities()
    }

    pub fn persist_bugs(&self) -> CacheResult<()> {
        let Some(dir) = &self.cache_dir else {
            return Ok(());
        };
        let _guard = lock(&self.persist);
        index::store(&dir.join(BUG_INDEX), &read(&self.bug_excerpts))
    }

    pub fn persist_identities(&self) -> CacheResult<()> {
        let Some(dir) = &self.cache_dir else {
            return Ok(());
        };
        let _guard = lock(&self.persist);
        index::store(&dir.join(IDENTITY_INDEX), &read(&self.identity_excerpts))
    }
}
