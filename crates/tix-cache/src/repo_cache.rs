//! The repository cache.
//!
//! [`RepoCache`] sits between callers and a [`Repository`]. It keeps an
//! excerpt of every ticket and identity in memory (and on disk, for
//! repositories with a metadata directory), answers queries from those
//! excerpts, and hands out [`BugCache`] / [`IdentityCache`] handles for the
//! entities that are actually read or edited. At most `cache.max_loaded`
//! tickets stay loaded; the least recently used ones without staged
//! operations are evicted.
//!
//! Locks are always taken in this order: loaded-handle map, then a handle's
//! entity lock, then the excerpt maps.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tix_config::{ConfigCache, Label};
use tix_entity::{
    edits, find_workflow, workflow_labels, Bug, BugAction, EntityError, Identity, OperationPack,
    Status,
};
use tix_merge::{MergeOutcome, MergeResult};
use tix_repo::{Namespace, Repository};
use tix_sync::{FetchResult, MergeReport, PullHooks, PullResult, PushResult};
use tix_types::{unix_now, EntityId, ObjectId};
use tracing::{debug, info, warn};

use crate::bug_cache::BugCache;
use crate::error::{CacheError, CacheResult};
use crate::excerpt::{BugExcerpt, IdentityExcerpt};
use crate::identity_cache::IdentityCache;
use crate::index::{self, BUG_INDEX, IDENTITY_INDEX};
use crate::lock::{LockFile, LOCK_FILE};
use crate::lru::Lru;
use crate::query::Query;
use crate::state::{lock, read, write, CacheState};

/// Cache directory under the repository's metadata directory.
pub const CACHE_DIR: &str = "cache";

const BUG_KIND: &str = "ticket";
const IDENTITY_KIND: &str = "identity";

/// What a new ticket starts with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBugOpts {
    pub title: String,
    pub message: String,
    pub workflow: Label,
    /// Required.
    pub repo: Option<Label>,
    pub impact: Vec<Label>,
    pub checklists: Vec<Label>,
    pub ccb_members: BTreeMap<Status, Vec<EntityId>>,
    pub assignee: Option<EntityId>,
}

impl NewBugOpts {
    pub fn new(title: impl Into<String>, message: impl Into<String>, workflow: Label) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            workflow,
            repo: None,
            impact: Vec::new(),
            checklists: Vec::new(),
            ccb_members: BTreeMap::new(),
            assignee: None,
        }
    }

    fn validate(&self, config: &ConfigCache) -> CacheResult<()> {
        let invalid = |msg: String| Err(CacheError::InvalidOptions(msg));

        if !self.workflow.is_workflow() || find_workflow(&self.workflow).is_none() {
            return invalid(format!("Invalid workflow: {}", self.workflow));
        }
        let repo = match &self.repo {
            Some(label) if !label.as_str().trim().is_empty() => label,
            _ => return invalid("Repo label cannot be left empty".into()),
        };
        if !repo.is_repo() || !config.labels.contains(repo) {
            return invalid(format!("Invalid repo label: {repo}"));
        }
        for label in &self.impact {
            if !label.is_impact() || !config.labels.contains(label) {
                return invalid(format!("Invalid impact label: {label}"));
            }
        }
        for label in &self.checklists {
            if !label.is_checklist() {
                return invalid(format!("Invalid checklist label: {label}"));
            }
            config.checklists.get(label)?;
        }
        for user in self.ccb_members.values().flatten() {
            if !config.ccb.is_member(user) {
                return invalid(format!("User {} is not a CCB member", user.human()));
            }
        }
        Ok(())
    }

    fn labels(&self) -> Vec<Label> {
        let mut labels = vec![self.workflow.clone()];
        labels.extend(self.repo.iter().cloned());
        labels.extend(self.impact.iter().cloned());
        labels.extend(self.checklists.iter().cloned());
        labels
    }
}

#[derive(Default)]
struct LoadedBugs {
    handles: HashMap<EntityId, Arc<BugCache>>,
    lru: Lru,
}

pub struct RepoCache {
    state: Arc<CacheState>,
    bugs: Mutex<LoadedBugs>,
    identities: Mutex<HashMap<EntityId, Arc<IdentityCache>>>,
    max_loaded: usize,
    _lock: Option<LockFile>,
}

impl RepoCache {
    // ---- lifecycle ----

    /// Lock the cache, load the tracker configuration and the excerpt
    /// indexes, rebuilding them when they are missing or unreadable.
    pub fn open(repo: Arc<Repository>) -> CacheResult<Self> {
        let cache_dir = repo.meta_dir().map(|meta| meta.join(CACHE_DIR));
        let lock_file = match &cache_dir {
            Some(dir) => Some(LockFile::acquire(&dir.join(LOCK_FILE))?),
            None => None,
        };
        let config = ConfigCache::load(&repo)?;
        let max_loaded = repo.config().cache.max_loaded.max(1);

        let cache = Self {
            state: Arc::new(CacheState::new(repo, cache_dir, config)),
            bugs: Mutex::new(LoadedBugs::default()),
            identities: Mutex::new(HashMap::new()),
            max_loaded,
            _lock: lock_file,
        };
        if !cache.load_indexes()? {
            cache.build_cache()?;
        }
        Ok(cache)
    }

    /// Write the indexes and release the lock.
    pub fn close(self) -> CacheResult<()> {
        self.state.persist_identities()?;
        self.state.persist_bugs()?;
        debug!("cache closed");
        Ok(())
    }

    fn load_indexes(&self) -> CacheResult<bool> {
        let Some(dir) = &self.state.cache_dir else {
            return Ok(false);
        };
        let bugs = index::load::<BugExcerpt>(&dir.join(BUG_INDEX))?;
        let identities = index::load::<IdentityExcerpt>(&dir.join(IDENTITY_INDEX))?;
        let (Some(bugs), Some(identities)) = (bugs, identities) else {
            return Ok(false);
        };
        *write(&self.state.bug_excerpts) = bugs;
        *write(&self.state.identity_excerpts) = identities;
        Ok(true)
    }

    /// Recompute every excerpt from the repository. Entities that fail to
    /// load are skipped with a warning.
    pub fn build_cache(&self) -> CacheResult<()> {
        info!("building cache");
        let repo = &self.state.repo;

        let mut identities = BTreeMap::new();
        for identity in Identity::read_all_local(repo) {
            match identity {
                Ok(identity) => {
                    identities.insert(identity.id(), IdentityExcerpt::new(&identity));
                }
                Err(e) => warn!(error = %e, "skipping unreadable identity"),
            }
        }
        let mut bugs = BTreeMap::new();
        for bug in Bug::read_all_local(repo) {
            match bug {
                Ok(bug) => {
                    bugs.insert(bug.id(), BugExcerpt::new(&bug, &bug.compile()));
                }
                Err(e) => warn!(error = %e, "skipping unreadable ticket"),
            }
        }
        info!(
            tickets = bugs.len(),
            identities = identities.len(),
            "cache built"
        );

        *write(&self.state.identity_excerpts) = identities;
        *write(&self.state.bug_excerpts) = bugs;
        self.state.persist_identities()?;
        self.state.persist_bugs()
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.state.repo
    }

    // ---- configuration ----

    pub fn config(&self) -> ConfigCache {
        read(&self.state.config).clone()
    }

    /// Register a new label and persist the label configuration.
    pub fn add_label(&self, label: Label) -> CacheResult<()> {
        write(&self.state.config).add_label(&self.state.repo, label)?;
        Ok(())
    }

    /// Apply `f` to the configuration and persist every document.
    pub fn update_config(&self, f: impl FnOnce(&mut ConfigCache)) -> CacheResult<()> {
        let mut config = write(&self.state.config);
        f(&mut config);
        config.store_labels(&self.state.repo)?;
        config.store_checklists(&self.state.repo)?;
        config.store_ccb(&self.state.repo)?;
        Ok(())
    }

    /// Configured labels, workflow labels and the labels of non-deprecated
    /// checklists, sorted.
    pub fn valid_labels(&self) -> Vec<Label> {
        let config = read(&self.state.config);
        let mut labels: Vec<Label> = config.labels.labels().cloned().collect();
        labels.extend(workflow_labels());
        labels.extend(config.checklists.labels());
        labels.sort();
        labels.dedup();
        labels
    }

    // ---- tickets ----

    pub fn resolve_bug_excerpt(&self, id: EntityId) -> CacheResult<BugExcerpt> {
        read(&self.state.bug_excerpts)
            .get(&id)
            .cloned()
            .ok_or(CacheError::NotFound { kind: BUG_KIND })
    }

    pub fn resolve_bug_excerpt_prefix(&self, prefix: &str) -> CacheResult<BugExcerpt> {
        self.resolve_bug_excerpt_matcher(|excerpt| excerpt.id.has_prefix(prefix))
    }

    /// The single excerpt accepted by `f`.
    pub fn resolve_bug_excerpt_matcher(
        &self,
        f: impl Fn(&BugExcerpt) -> bool,
    ) -> CacheResult<BugExcerpt> {
        let excerpts = read(&self.state.bug_excerpts);
        single(BUG_KIND, excerpts.values().filter(|e| f(e)), |e| e.id)
    }

    /// A loaded handle for `id`, reading the ticket if needed.
    pub fn resolve_bug(&self, id: EntityId) -> CacheResult<Arc<BugCache>> {
        let mut loaded = lock(&self.bugs);
        if let Some(handle) = loaded.handles.get(&id).cloned() {
            loaded.lru.touch(id);
            return Ok(handle);
        }
        let bug = match Bug::read_local(&self.state.repo, id) {
            Ok(bug) => bug,
            Err(EntityError::NotFound(_)) => return Err(CacheError::NotFound { kind: BUG_KIND }),
            Err(e) => return Err(e.into()),
        };
        let handle = Arc::new(BugCache::new(Arc::clone(&self.state), bug));
        loaded.handles.insert(id, Arc::clone(&handle));
        loaded.lru.touch(id);
        self.evict_if_needed(&mut loaded);
        Ok(handle)
    }

    pub fn resolve_bug_prefix(&self, prefix: &str) -> CacheResult<Arc<BugCache>> {
        let id = self.resolve_bug_excerpt_prefix(prefix)?.id;
        self.resolve_bug(id)
    }

    pub fn resolve_bug_matcher(&self, f: impl Fn(&BugExcerpt) -> bool) -> CacheResult<Arc<BugCache>> {
        let id = self.resolve_bug_excerpt_matcher(f)?.id;
        self.resolve_bug(id)
    }

    /// The ticket whose create operation carries `key = value`.
    pub fn resolve_bug_create_metadata(&self, key: &str, value: &str) -> CacheResult<Arc<BugCache>> {
        self.resolve_bug_matcher(|excerpt| {
            excerpt.create_metadata.get(key).map(String::as_str) == Some(value)
        })
    }

    pub fn query_bugs(&self, query: &Query) -> Vec<EntityId> {
        let identities = read(&self.state.identity_excerpts);
        let bugs = read(&self.state.bug_excerpts);
        query.run(bugs.values(), &identities)
    }

    pub fn all_bug_ids(&self) -> Vec<EntityId> {
        read(&self.state.bug_excerpts).keys().copied().collect()
    }

    /// Number of tickets currently loaded.
    pub fn loaded_bugs(&self) -> usize {
        lock(&self.bugs).handles.len()
    }

    fn evict_if_needed(&self, loaded: &mut LoadedBugs) {
        if loaded.lru.len() <= self.max_loaded {
            return;
        }
        let mut excess = loaded.lru.len() - self.max_loaded;
        for id in loaded.lru.oldest_first() {
            if excess == 0 {
                break;
            }
            if let Some(handle) = loaded.handles.get(&id) {
                if !handle.try_evict() {
                    continue;
                }
            }
            loaded.handles.remove(&id);
            loaded.lru.remove(&id);
            excess -= 1;
        }
        if excess > 0 {
            debug!(excess, "loaded tickets over the limit all have staged operations");
        }
    }

    /// Unload a ticket, staged operations included.
    fn discard_bug_handle(&self, id: &EntityId) {
        let mut loaded = lock(&self.bugs);
        if let Some(handle) = loaded.handles.remove(id) {
            if handle.need_commit() {
                warn!(id = %id.human(), "discarding staged operations");
            }
            handle.evict();
        }
        loaded.lru.remove(id);
    }

    /// Unload a ticket unless its handle has staged operations. Returns
    /// whether the ticket left the cache.
    fn release_bug_handle(&self, id: &EntityId) -> bool {
        let mut loaded = lock(&self.bugs);
        if let Some(handle) = loaded.handles.get(id) {
            if !handle.try_evict() {
                return false;
            }
            loaded.handles.remove(id);
        }
        loaded.lru.remove(id);
        true
    }

    /// The excerpt of `merged`. A loaded handle takes the new history and
    /// keeps its staged operations.
    fn reload_bug_handle(&self, merged: &Bug) -> BugExcerpt {
        let handle = lock(&self.bugs).handles.get(&merged.id()).cloned();
        match handle {
            Some(handle) => handle.reload(merged),
            None => BugExcerpt::new(merged, &merged.compile()),
        }
    }

    /// Create, commit and index a ticket authored by the user identity.
    pub fn new_bug(&self, opts: NewBugOpts) -> CacheResult<Arc<BugCache>> {
        let author = self.state.user()?;
        let now = unix_now();
        let bug = {
            let config = read(&self.state.config);
            opts.validate(&config)?;

            let mut bug = edits::create(author, now, &opts.title, &opts.message, Vec::new())?;
            edits::force_change_labels(&mut bug, author, now, &opts.labels(), &[])?;
            for (status, users) in &opts.ccb_members {
                for user in users {
                    edits::ccb_add(&mut bug, author, now, *user, *status, &config)?;
                }
            }
            if let Some(assignee) = opts.assignee {
                edits::set_assignee(&mut bug, author, now, assignee)?;
            }
            bug
        };
        self.insert_new_bug(bug)
    }

    /// Create a ticket without validating labels or CCB. `metadata` is set
    /// on the create operation.
    pub fn new_bug_raw(
        &self,
        author: EntityId,
        unix_time: i64,
        title: &str,
        message: &str,
        files: Vec<ObjectId>,
        metadata: BTreeMap<String, String>,
    ) -> CacheResult<Arc<BugCache>> {
        let mut bug = edits::create(author, unix_time, title, message, files)?;
        if !metadata.is_empty() {
            let target = bug.id();
            edits::set_metadata(&mut bug, author, unix_time, target, metadata)?;
        }
        self.insert_new_bug(bug)
    }

    fn insert_new_bug(&self, mut bug: Bug) -> CacheResult<Arc<BugCache>> {
        let id = bug.id();
        let mut loaded = lock(&self.bugs);
        if loaded.handles.contains_key(&id) || read(&self.state.bug_excerpts).contains_key(&id) {
            return Err(CacheError::AlreadyExists { kind: BUG_KIND, id });
        }
        bug.commit(&self.state.repo)?;
        self.state.bug_updated(&bug)?;

        let handle = Arc::new(BugCache::new(Arc::clone(&self.state), bug));
        loaded.handles.insert(id, Arc::clone(&handle));
        loaded.lru.touch(id);
        self.evict_if_needed(&mut loaded);
        info!(id = %id.human(), "ticket created");
        Ok(handle)
    }

    /// Delete a ticket locally, with its tracking refs and excerpt.
    pub fn remove_bug(&self, prefix: &str) -> CacheResult<EntityId> {
        let id = self.resolve_bug_excerpt_prefix(prefix)?.id;
        self.discard_bug_handle(&id);
        Bug::remove(&self.state.repo, id)?;
        write(&self.state.bug_excerpts).remove(&id);
        self.state.persist_bugs()?;
        info!(id = %id.human(), "ticket removed");
        Ok(id)
    }

    /// Delete a ticket on `remote`, then locally. Replicas that fetch from
    /// `remote` afterwards lose their tracking ref for it.
    pub fn remove_bug_remote(&self, prefix: &str, remote: &str) -> CacheResult<EntityId> {
        let id = self.resolve_bug_excerpt_prefix(prefix)?.id;
        if !tix_sync::push_removal(&self.state.repo, remote, Namespace::BUGS, &id.to_hex())? {
            warn!(id = %id.human(), remote, "ticket was not on the remote");
        }
        self.remove_bug(&id.to_hex())
    }

    /// Point a ticket back at its state on `remote`, dropping local history.
    pub fn reset_bug(&self, prefix: &str, remote: &str) -> CacheResult<EntityId> {
        let id = self.resolve_bug_excerpt_prefix(prefix)?.id;
        self.discard_bug_handle(&id);
        Bug::reset(&self.state.repo, remote, id)?;
        let bug = Bug::read_local(&self.state.repo, id)?;
        self.state.bug_updated(&bug)?;
        Ok(id)
    }

    // ---- identities ----

    pub fn resolve_identity_excerpt(&self, id: EntityId) -> CacheResult<IdentityExcerpt> {
        read(&self.state.identity_excerpts)
            .get(&id)
            .cloned()
            .ok_or(CacheError::NotFound { kind: IDENTITY_KIND })
    }

    pub fn resolve_identity_excerpt_prefix(&self, prefix: &str) -> CacheResult<IdentityExcerpt> {
        self.resolve_identity_excerpt_matcher(|excerpt| excerpt.id.has_prefix(prefix))
    }

    pub fn resolve_identity_excerpt_matcher(
        &self,
        f: impl Fn(&IdentityExcerpt) -> bool,
    ) -> CacheResult<IdentityExcerpt> {
        let excerpts = read(&self.state.identity_excerpts);
        single(IDENTITY_KIND, excerpts.values().filter(|e| f(e)), |e| e.id)
    }

    pub fn resolve_identity(&self, id: EntityId) -> CacheResult<Arc<IdentityCache>> {
        let mut loaded = lock(&self.identities);
        if let Some(handle) = loaded.get(&id) {
            return Ok(Arc::clone(handle));
        }
        let identity = match Identity::read_local(&self.state.repo, id) {
            Ok(identity) => identity,
            Err(EntityError::NotFound(_)) => {
                return Err(CacheError::NotFound { kind: IDENTITY_KIND })
            }
            Err(e) => return Err(e.into()),
        };
        let handle = Arc::new(IdentityCache::new(Arc::clone(&self.state), identity));
        loaded.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn resolve_identity_prefix(&self, prefix: &str) -> CacheResult<Arc<IdentityCache>> {
        let id = self.resolve_identity_excerpt_prefix(prefix)?.id;
        self.resolve_identity(id)
    }

    pub fn resolve_identity_matcher(
        &self,
        f: impl Fn(&IdentityExcerpt) -> bool,
    ) -> CacheResult<Arc<IdentityCache>> {
        let id = self.resolve_identity_excerpt_matcher(f)?.id;
        self.resolve_identity(id)
    }

    /// The identity whose create operation carries `key = value`.
    pub fn resolve_identity_create_metadata(
        &self,
        key: &str,
        value: &str,
    ) -> CacheResult<Arc<IdentityCache>> {
        let ids: Vec<EntityId> = self.all_identity_ids();
        let mut found = Vec::new();
        for id in ids {
            let handle = self.resolve_identity(id)?;
            if handle.snapshot().metadata.get(key).map(String::as_str) == Some(value) {
                found.push(handle);
            }
        }
        match found.len() {
            0 => Err(CacheError::NotFound { kind: IDENTITY_KIND }),
            1 => Ok(found.remove(0)),
            _ => Err(CacheError::MultipleMatch {
                kind: IDENTITY_KIND,
                ids: found.iter().map(|h| h.id()).collect(),
            }),
        }
    }

    pub fn all_identity_ids(&self) -> Vec<EntityId> {
        read(&self.state.identity_excerpts).keys().copied().collect()
    }

    /// Create and commit an identity.
    pub fn new_identity(
        &self,
        name: &str,
        email: &str,
        login: &str,
    ) -> CacheResult<Arc<IdentityCache>> {
        let mut identity = Identity::create(name, email, login, unix_now())?;
        let id = identity.id();
        let mut loaded = lock(&self.identities);
        if loaded.contains_key(&id) || read(&self.state.identity_excerpts).contains_key(&id) {
            return Err(CacheError::AlreadyExists {
                kind: IDENTITY_KIND,
                id,
            });
        }
        identity.commit(&self.state.repo)?;
        self.state.identity_updated(&identity)?;
        let handle = Arc::new(IdentityCache::new(Arc::clone(&self.state), identity));
        loaded.insert(id, Arc::clone(&handle));
        info!(id = %id.human(), name, "identity created");
        Ok(handle)
    }

    /// Make `id` the author of everything this repository writes.
    pub fn set_user_identity(&self, id: EntityId) -> CacheResult<()> {
        self.resolve_identity_excerpt(id)?;
        self.state.repo.set_user_identity(id)?;
        Ok(())
    }

    pub fn user_identity(&self) -> CacheResult<Arc<IdentityCache>> {
        self.resolve_identity(self.state.user()?)
    }

    pub fn user_identity_excerpt(&self) -> CacheResult<IdentityExcerpt> {
        self.resolve_identity_excerpt(self.state.user()?)
    }

    fn drop_identity_handle(&self, id: &EntityId) {
        lock(&self.identities).remove(id);
    }

    fn reload_identity_handle(&self, merged: &Identity) -> IdentityExcerpt {
        let handle = lock(&self.identities).get(&merged.id()).cloned();
        match handle {
            Some(handle) => handle.reload(merged),
            None => IdentityExcerpt::new(merged),
        }
    }

    // ---- sync ----

    /// Fetch from `remote`. Tickets and identities deleted along with a
    /// pruned tracking ref leave the cache too, except tickets with staged
    /// operations, which their next commit brings back.
    pub fn fetch(&self, remote: &str) -> CacheResult<FetchResult> {
        let result = tix_sync::fetch(&self.state.repo, remote)?;
        CacheHooks { cache: self, remote }.fetched(&result);
        self.persist_all()?;
        Ok(result)
    }

    pub fn push(&self, remote: &str) -> CacheResult<PushResult> {
        Ok(tix_sync::push(&self.state.repo, remote)?)
    }

    /// Merge every tracking ref of `remote`, identities first. Merged
    /// entities get a fresh excerpt, and loaded handles move onto the merged
    /// history with their staged operations kept.
    pub fn merge_all(&self, remote: &str) -> CacheResult<MergeReport> {
        let mut hooks = CacheHooks { cache: self, remote };
        let report = tix_sync::merge_with(&self.state.repo, remote, &mut hooks)?;
        self.persist_all()?;
        Ok(report)
    }

    /// Fetch, merge, then reconcile and reload the configuration.
    pub fn pull(&self, remote: &str) -> CacheResult<PullResult> {
        let mut hooks = CacheHooks { cache: self, remote };
        let result = tix_sync::pull_with(&self.state.repo, remote, &mut hooks)?;
        self.persist_all()?;
        *write(&self.state.config) = ConfigCache::load(&self.state.repo)?;
        Ok(result)
    }

    fn persist_all(&self) -> CacheResult<()> {
        self.state.persist_identities()?;
        self.state.persist_bugs()
    }

    /// Bring the excerpts in line with refs changed behind the cache's back:
    /// tickets whose head pack has another edit time are reloaded, excerpts
    /// of tickets that are gone are dropped, and identities are re-read.
    pub fn refresh(&self) -> CacheResult<()> {
        let repo = Arc::clone(&self.state.repo);
        let local: BTreeSet<EntityId> = Bug::list_local_ids(&repo)?.into_iter().collect();

        let mut stale = Vec::new();
        {
            let excerpts = read(&self.state.bug_excerpts);
            for id in &local {
                let Some(excerpt) = excerpts.get(id) else {
                    stale.push(*id);
                    continue;
                };
                let head = repo.resolve_ref(&Namespace::BUGS.local_ref(&id.to_hex()))?;
                if OperationPack::<BugAction>::read(&repo, &head)?.edit_time != excerpt.edit_lamport {
                    stale.push(*id);
                }
            }
        }
        let gone: Vec<EntityId> = read(&self.state.bug_excerpts)
            .keys()
            .filter(|id| !local.contains(*id))
            .copied()
            .collect();

        for id in &gone {
            if self.release_bug_handle(id) {
                write(&self.state.bug_excerpts).remove(id);
            }
        }
        for id in &stale {
            match Bug::read_local(&repo, *id) {
                Ok(bug) => {
                    let excerpt = self.reload_bug_handle(&bug);
                    write(&self.state.bug_excerpts).insert(*id, excerpt);
                }
                Err(e) => warn!(id = %id.human(), error = %e, "skipping unreadable ticket"),
            }
        }

        let mut identities = BTreeMap::new();
        for identity in Identity::read_all_local(&repo) {
            match identity {
                Ok(identity) => {
                    let excerpt = self.reload_identity_handle(&identity);
                    identities.insert(identity.id(), excerpt);
                }
                Err(e) => warn!(error = %e, "skipping unreadable identity"),
            }
        }
        lock(&self.identities).retain(|id, _| identities.contains_key(id));
        *write(&self.state.identity_excerpts) = identities;

        info!(reloaded = stale.len(), dropped = gone.len(), "cache refreshed");
        self.state.persist_identities()?;
        self.state.persist_bugs()
    }
}

/// Keeps excerpts and loaded handles in step with a fetch or merge.
struct CacheHooks<'a> {
    cache: &'a RepoCache,
    remote: &'a str,
}

impl PullHooks for CacheHooks<'_> {
    fn fetched(&mut self, result: &FetchResult) {
        let cache = self.cache;
        for name in &result.refs_removed {
            if let Some(id) = entity_id(Namespace::BUGS, name) {
                if cache.release_bug_handle(&id) {
                    write(&cache.state.bug_excerpts).remove(&id);
                } else {
                    warn!(
                        id = %id.human(),
                        remote = self.remote,
                        "removed on the remote but has staged operations"
                    );
                }
            } else if let Some(id) = entity_id(Namespace::IDENTITIES, name) {
                cache.drop_identity_handle(&id);
                write(&cache.state.identity_excerpts).remove(&id);
            }
        }
    }

    fn identity_merged(&mut self, result: &MergeResult<Identity>) {
        if let Ok(MergeOutcome::New(identity) | MergeOutcome::Updated(identity)) = &result.outcome {
            let excerpt = self.cache.reload_identity_handle(identity);
            write(&self.cache.state.identity_excerpts).insert(excerpt.id, excerpt);
        }
    }

    fn bug_merged(&mut self, result: &MergeResult<Bug>) {
        if let Ok(MergeOutcome::New(bug) | MergeOutcome::Updated(bug)) = &result.outcome {
            let excerpt = self.cache.reload_bug_handle(bug);
            write(&self.cache.state.bug_excerpts).insert(excerpt.id, excerpt);
        }
    }
}

fn entity_id(ns: Namespace, ref_name: &str) -> Option<EntityId> {
    if !ref_name.starts_with(&ns.local_prefix()) {
        return None;
    }
    ns.suffix(ref_name).and_then(|hex| EntityId::from_hex(hex).ok())
}

fn single<'a, E: Clone + 'a>(
    kind: &'static str,
    matches: impl Iterator<Item = &'a E>,
    id: impl Fn(&E) -> EntityId,
) -> CacheResult<E> {
    let mut found: Vec<&E> = matches.collect();
    match found.len() {
        0 => Err(CacheError::NotFound { kind }),
        1 => Ok(found.remove(0).clone()),
        _ => Err(CacheError::MultipleMatch {
            kind,
            ids: found.into_iter().map(id).collect(),
        }),
    }
}
