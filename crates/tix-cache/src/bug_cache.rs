//! A loaded ticket behind the cache.
//!
//! Every mutation goes through [`BugCache`] so that the excerpt index stays
//! in step with the ticket. Mutations stage operations; [`BugCache::commit`]
//! writes them. A handle evicted from the cache refuses further edits and
//! callers should resolve the ticket again.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tix_config::{Checklist, Label};
use tix_entity::{edits, Bug, EntityResult, LabelChangeResult, PullRequest, Snapshot, Status};
use tix_types::{unix_now, EntityId, ObjectId};

use crate::error::{CacheError, CacheResult};
use crate::excerpt::BugExcerpt;
use crate::state::{read, write, CacheState};

pub struct BugCache {
    id: EntityId,
    state: Arc<CacheState>,
    bug: RwLock<Bug>,
    evicted: AtomicBool,
}

impl BugCache {
    pub(crate) fn new(state: Arc<CacheState>, bug: Bug) -> Self {
        Self {
            id: bug.id(),
            state,
            bug: RwLock::new(bug),
            evicted: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn snapshot(&self) -> Snapshot {
        read(&self.bug).compile()
    }

    pub fn need_commit(&self) -> bool {
        read(&self.bug).need_commit()
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }

    /// Waits for in-flight edits before flagging the handle.
    pub(crate) fn evict(&self) {
        let _bug = write(&self.bug);
        self.evicted.store(true, Ordering::Release);
    }

    /// Flag the handle unless it has staged operations. The check and the
    /// flag happen under one write guard.
    pub(crate) fn try_evict(&self) -> bool {
        let bug = write(&self.bug);
        if bug.need_commit() {
            return false;
        }
        self.evicted.store(true, Ordering::Release);
        true
    }

    /// Swap in merged history, keeping staged operations, and return the
    /// excerpt of the result.
    pub(crate) fn reload(&self, merged: &Bug) -> BugExcerpt {
        let mut bug = write(&self.bug);
        if self.is_evicted() {
            return BugExcerpt::new(merged, &merged.compile());
        }
        bug.reload(merged.clone());
        BugExcerpt::new(&bug, &bug.compile())
    }

    /// Run `f` on the ticket under the write lock, then refresh its excerpt.
    pub fn edit_raw<T>(&self, f: impl FnOnce(&mut Bug) -> EntityResult<T>) -> CacheResult<T> {
        let mut bug = write(&self.bug);
        if self.is_evicted() {
            return Err(CacheError::Evicted(self.id));
        }
        let out = f(&mut bug)?;
        self.state.bug_updated(&bug)?;
        Ok(out)
    }

    /// Like [`edit_raw`](Self::edit_raw), authored by the repository's user
    /// identity at the current time.
    fn edit<T>(
        &self,
        f: impl FnOnce(&mut Bug, EntityId, i64) -> EntityResult<T>,
    ) -> CacheResult<T> {
        let author = self.state.user()?;
        let now = unix_now();
        self.edit_raw(|bug| f(bug, author, now))
    }

    // ---- comments ----

    pub fn add_comment(&self, message: &str) -> CacheResult<EntityId> {
        self.add_comment_with_files(message, Vec::new())
    }

    pub fn add_comment_with_files(
        &self,
        message: &str,
        files: Vec<ObjectId>,
    ) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::add_comment(bug, author, now, message, files))
    }

    pub fn edit_comment(&self, target: EntityId, message: &str) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| {
            edits::edit_comment(bug, author, now, target, message, Vec::new())
        })
    }

    pub fn edit_create_comment(&self, message: &str) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| {
            edits::edit_create_comment(bug, author, now, message, Vec::new())
        })
    }

    // ---- fields ----

    pub fn set_title(&self, title: &str) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::set_title(bug, author, now, title))
    }

    /// Move along the ticket's workflow.
    pub fn set_status(&self, status: Status) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::set_status(bug, author, now, status))
    }

    pub fn force_set_status(&self, status: Status) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::force_set_status(bug, author, now, status))
    }

    pub fn set_assignee(&self, assignee: EntityId) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::set_assignee(bug, author, now, assignee))
    }

    // ---- labels ----

    pub fn change_labels(
        &self,
        add: &[Label],
        remove: &[Label],
        allow_deprecated: bool,
    ) -> CacheResult<Vec<LabelChangeResult>> {
        let config = read(&self.state.config);
        self.edit(|bug, author, now| {
            edits::change_labels(bug, author, now, add, remove, allow_deprecated, &config)
        })
    }

    /// Change labels without checking them against the configuration.
    pub fn force_change_labels(&self, add: &[Label], remove: &[Label]) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::force_change_labels(bug, author, now, add, remove))
    }

    // ---- ccb ----

    pub fn ccb_add(&self, user: EntityId, status: Status) -> CacheResult<EntityId> {
        let config = read(&self.state.config);
        self.edit(|bug, author, now| edits::ccb_add(bug, author, now, user, status, &config))
    }

    pub fn ccb_rm(&self, user: EntityId, status: Status) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::ccb_rm(bug, author, now, user, status))
    }

    pub fn ccb_approve(&self, status: Status) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::ccb_approve(bug, author, now, status))
    }

    pub fn ccb_block(&self, status: Status) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::ccb_block(bug, author, now, status))
    }

    // ---- checklists and reviews ----

    pub fn set_checklist(&self, checklist: Checklist) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::set_checklist(bug, author, now, checklist))
    }

    pub fn set_review(&self, review: PullRequest) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::set_review(bug, author, now, review))
    }

    pub fn rm_review(&self, review_id: &str) -> CacheResult<EntityId> {
        self.set_review(PullRequest::Remove {
            id: review_id.to_string(),
        })
    }

    // ---- metadata ----

    pub fn set_metadata(
        &self,
        target: EntityId,
        metadata: BTreeMap<String, String>,
    ) -> CacheResult<EntityId> {
        self.edit(|bug, author, now| edits::set_metadata(bug, author, now, target, metadata))
    }

    /// The id of the first operation carrying `key = value` in its metadata.
    pub fn resolve_operation_with_metadata(&self, key: &str, value: &str) -> CacheResult<EntityId> {
        self.snapshot()
            .operations
            .iter()
            .find(|op| op.get_metadata(key) == Some(value))
            .map(|op| op.id())
            .ok_or(CacheError::NoMatchingOp)
    }

    // ---- persistence ----

    pub fn commit(&self) -> CacheResult<()> {
        let repo = Arc::clone(&self.state.repo);
        self.edit_raw(|bug| bug.commit(&repo))
    }

    pub fn commit_as_needed(&self) -> CacheResult<()> {
        let repo = Arc::clone(&self.state.repo);
        self.edit_raw(|bug| bug.commit_as_needed(&repo))
    }
}

impl std::fmt::Debug for BugCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BugCache")
            .field("id", &self.id.human())
            .field("evicted", &self.is_evicted())
            .finish()
    }
}
