use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tix_crypto::SigningKey;
use tix_dag::CommitGraph;
use tix_refs::{FsRefStore, InMemoryRefStore, RefStore};
use tix_store::{Blob, Commit, FsObjectStore, InMemoryObjectStore, ObjectStore, Tree, TreeEntry};
use tix_types::{EntityId, LamportClock, LamportTime, ObjectId};
use tracing::{debug, info};

use crate::config::RepoConfig;
use crate::error::{RepoError, RepoResult};

/// Name of the metadata directory inside a working directory.
pub const META_DIR: &str = ".tix";

const CONFIG_FILE: &str = "config.toml";

/// A tix repository: objects, refs, signing key, clocks and remotes.
pub struct Repository {
    objects: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    signer: Option<Arc<SigningKey>>,
    meta_dir: Option<PathBuf>,
    config: RwLock<RepoConfig>,
    clocks: Mutex<HashMap<String, Arc<LamportClock>>>,
    remotes: RwLock<BTreeMap<String, Arc<Repository>>>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("meta_dir", &self.meta_dir)
            .field("signing", &self.signer.is_some())
            .finish()
    }
}

impl Repository {
    /// Assemble a repository from its parts.
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        refs: Arc<dyn RefStore>,
        signer: Option<SigningKey>,
        meta_dir: Option<PathBuf>,
        config: RepoConfig,
    ) -> Self {
        Self {
            objects,
            refs,
            signer: signer.map(Arc::new),
            meta_dir,
            config: RwLock::new(config),
            clocks: Mutex::new(HashMap::new()),
            remotes: RwLock::new(BTreeMap::new()),
        }
    }

    /// An in-memory repository with a fresh signing key.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryRefStore::new()),
            Some(SigningKey::generate()),
            None,
            RepoConfig::default(),
        )
    }

    /// An in-memory repository whose metadata (cache, lock, clocks) lives in
    /// `meta_dir`.
    pub fn in_memory_at(meta_dir: impl Into<PathBuf>) -> RepoResult<Self> {
        let meta_dir = meta_dir.into();
        fs::create_dir_all(&meta_dir)?;
        Ok(Self::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryRefStore::new()),
            Some(SigningKey::generate()),
            Some(meta_dir),
            RepoConfig::default(),
        ))
    }

    /// An in-memory repository with signing disabled. Reads work, pack
    /// commits fail with [`RepoError::SigningDisabled`].
    pub fn in_memory_unsigned() -> Self {
        let mut config = RepoConfig::default();
        config.signing.enabled = false;
        Self::new(
            Arc::new(InMemoryObjectStore::new()),
            Arc::new(InMemoryRefStore::new()),
            None,
            None,
            config,
        )
    }

    /// Create `<path>/.tix` with a fresh signing key and default config.
    pub fn init(path: &Path) -> RepoResult<Self> {
        let meta = path.join(META_DIR);
        if meta.join(CONFIG_FILE).exists() {
            return Err(RepoError::AlreadyInitialized(path.to_path_buf()));
        }
        fs::create_dir_all(&meta)?;
        let config = RepoConfig::default();
        let key = SigningKey::generate();
        fs::write(meta.join(&config.signing.key_file), key.to_hex())?;
        config.save(&meta.join(CONFIG_FILE))?;
        info!(path = %path.display(), "initialized repository");
        Self::open(path)
    }

    /// Open an initialized repository and the remotes listed in its config.
    pub fn open(path: &Path) -> RepoResult<Self> {
        let repo = Self::open_bare(path)?;
        let remotes = repo.config().remotes;
        for (name, remote_path) in remotes {
            let remote = Self::open_bare(&remote_path)?;
            repo.add_remote(&name, Arc::new(remote))?;
        }
        Ok(repo)
    }

    fn open_bare(path: &Path) -> RepoResult<Self> {
        let meta = path.join(META_DIR);
        if !meta.is_dir() {
            return Err(RepoError::NotInitialized(path.to_path_buf()));
        }
        let config = RepoConfig::load(&meta.join(CONFIG_FILE))?;
        let signer = if config.signing.enabled {
            let key_path = meta.join(&config.signing.key_file);
            let hex = fs::read_to_string(&key_path)?;
            Some(SigningKey::from_hex(&hex)?)
        } else {
            None
        };
        let objects = FsObjectStore::open(meta.join("objects"))?;
        let refs = FsRefStore::open(&meta)?;
        Ok(Self::new(
            Arc::new(objects),
            Arc::new(refs),
            signer,
            Some(meta),
            config,
        ))
    }

    // ---- Accessors ----

    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    pub fn refs(&self) -> &dyn RefStore {
        self.refs.as_ref()
    }

    pub fn graph(&self) -> CommitGraph<'_> {
        CommitGraph::new(self.objects.as_ref())
    }

    /// Directory for cache files, the lock file and persisted clocks.
    pub fn meta_dir(&self) -> Option<&Path> {
        self.meta_dir.as_deref()
    }

    pub fn signing_enabled(&self) -> bool {
        self.signer.is_some()
    }

    pub fn config(&self) -> RepoConfig {
        self.config
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Apply `f` to the config and persist it for on-disk repositories.
    pub fn update_config<F>(&self, f: F) -> RepoResult<()>
    where
        F: FnOnce(&mut RepoConfig),
    {
        let mut config = self
            .config
            .write()
            .map_err(|e| RepoError::Config(format!("lock poisoned: {e}")))?;
        f(&mut *config);
        if let Some(meta) = &self.meta_dir {
            config.save(&meta.join(CONFIG_FILE))?;
        }
        Ok(())
    }

    pub fn user_identity(&self) -> Option<EntityId> {
        self.config().user.identity
    }

    pub fn set_user_identity(&self, id: EntityId) -> RepoResult<()> {
        self.update_config(|c| c.user.identity = Some(id))
    }

    // ---- Content operations ----

    pub fn store_data(&self, data: &[u8]) -> RepoResult<ObjectId> {
        Ok(self
            .objects
            .write(&Blob::new(data.to_vec()).to_stored_object())?)
    }

    pub fn read_data(&self, id: &ObjectId) -> RepoResult<Vec<u8>> {
        let obj = self
            .objects
            .read(id)?
            .ok_or(RepoError::ObjectNotFound(*id))?;
        Ok(Blob::from_stored_object(&obj)?.data)
    }

    pub fn store_tree(&self, entries: Vec<TreeEntry>) -> RepoResult<ObjectId> {
        let tree = Tree::new(entries);
        Ok(self.objects.write(&tree.to_stored_object()?)?)
    }

    pub fn read_tree(&self, id: &ObjectId) -> RepoResult<Tree> {
        let obj = self
            .objects
            .read(id)?
            .ok_or(RepoError::ObjectNotFound(*id))?;
        Ok(Tree::from_stored_object(&obj)?)
    }

    // ---- Commit operations ----

    /// Create a signed root commit.
    pub fn store_commit(&self, tree: ObjectId) -> RepoResult<ObjectId> {
        self.write_commit(Commit::new(tree, vec![]))
    }

    /// Create a signed commit with a single parent.
    pub fn store_commit_with_parent(
        &self,
        tree: ObjectId,
        parent: ObjectId,
    ) -> RepoResult<ObjectId> {
        self.write_commit(Commit::new(tree, vec![parent]))
    }

    fn write_commit(&self, commit: Commit) -> RepoResult<ObjectId> {
        let signer = self.signer.as_ref().ok_or(RepoError::SigningDisabled)?;
        let signed = commit.sign(signer)?;
        let id = self.objects.write(&signed.to_stored_object()?)?;
        debug!(commit = %id.short_hex(), parents = signed.parents.len(), "commit stored");
        Ok(id)
    }

    /// Read a commit and check its signature.
    pub fn read_commit(&self, id: &ObjectId) -> RepoResult<Commit> {
        let obj = self
            .objects
            .read(id)?
            .ok_or(RepoError::ObjectNotFound(*id))?;
        let commit = Commit::from_stored_object(&obj)?;
        commit.verify(*id)?;
        Ok(commit)
    }

    // ---- Ref operations ----

    pub fn resolve_ref(&self, name: &str) -> RepoResult<ObjectId> {
        self.refs
            .read_ref(name)?
            .ok_or_else(|| RepoError::RefNotFound(name.to_string()))
    }

    pub fn ref_exists(&self, name: &str) -> RepoResult<bool> {
        Ok(self.refs.read_ref(name)?.is_some())
    }

    pub fn update_ref(&self, name: &str, target: ObjectId) -> RepoResult<()> {
        self.refs.write_ref(name, target)?;
        Ok(())
    }

    pub fn remove_ref(&self, name: &str) -> RepoResult<bool> {
        Ok(self.refs.delete_ref(name)?)
    }

    /// Point `dst` at whatever `src` points to.
    pub fn copy_ref(&self, src: &str, dst: &str) -> RepoResult<()> {
        let target = self.resolve_ref(src)?;
        self.update_ref(dst, target)
    }

    /// Names of the refs starting with `prefix`, sorted.
    pub fn list_refs(&self, prefix: &str) -> RepoResult<Vec<String>> {
        Ok(self
            .refs
            .list_refs(prefix)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    // ---- Graph queries ----

    /// First-parent history ending at `head`, oldest first.
    pub fn chain(&self, head: &ObjectId) -> RepoResult<Vec<ObjectId>> {
        Ok(self.graph().chain(head)?)
    }

    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> RepoResult<bool> {
        Ok(self.graph().is_ancestor(ancestor, descendant)?)
    }

    /// Commits reachable from `head` and not from `base`, oldest first.
    pub fn commits_between(
        &self,
        base: Option<&ObjectId>,
        head: &ObjectId,
    ) -> RepoResult<Vec<ObjectId>> {
        Ok(self.graph().commits_between(base, head)?)
    }

    pub fn find_common_ancestor(
        &self,
        a: &ObjectId,
        b: &ObjectId,
    ) -> RepoResult<Option<ObjectId>> {
        Ok(self.graph().find_common_ancestor(a, b)?)
    }

    // ---- Lamport clocks ----

    /// The named clock, restored from disk on first use.
    pub fn clock(&self, name: &str) -> RepoResult<Arc<LamportClock>> {
        let mut clocks = self
            .clocks
            .lock()
            .map_err(|e| RepoError::Config(format!("lock poisoned: {e}")))?;
        if let Some(clock) = clocks.get(name) {
            return Ok(Arc::clone(clock));
        }
        let clock = match self.clock_path(name) {
            Some(path) if path.exists() => {
                let text = fs::read_to_string(&path)?;
                let next = text
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| RepoError::Config(format!("clock {name}: {e}")))?;
                LamportClock::with_value(LamportTime(next))
            }
            _ => LamportClock::new(),
        };
        let clock = Arc::new(clock);
        clocks.insert(name.to_string(), Arc::clone(&clock));
        Ok(clock)
    }

    /// Take the next time from the named clock.
    pub fn increment_clock(&self, name: &str) -> RepoResult<LamportTime> {
        let clock = self.clock(name)?;
        let time = clock.increment();
        self.persist_clock(name, &clock)?;
        Ok(time)
    }

    /// Make sure the named clock is past a time seen on another replica.
    pub fn witness_clock(&self, name: &str, seen: LamportTime) -> RepoResult<()> {
        let clock = self.clock(name)?;
        clock.witness(seen);
        self.persist_clock(name, &clock)
    }

    fn clock_path(&self, name: &str) -> Option<PathBuf> {
        self.meta_dir
            .as_ref()
            .map(|meta| meta.join("clocks").join(name))
    }

    fn persist_clock(&self, name: &str, clock: &LamportClock) -> RepoResult<()> {
        if let Some(path) = self.clock_path(name) {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(path, clock.time().0.to_string())?;
        }
        Ok(())
    }

    // ---- Remotes ----

    pub fn add_remote(&self, name: &str, remote: Arc<Repository>) -> RepoResult<()> {
        tix_refs::validate_remote_name(name)?;
        let mut remotes = self
            .remotes
            .write()
            .map_err(|e| RepoError::Config(format!("lock poisoned: {e}")))?;
        remotes.insert(name.to_string(), remote);
        Ok(())
    }

    /// Register a remote by path and record it in the config.
    pub fn add_remote_path(&self, name: &str, path: &Path) -> RepoResult<()> {
        let remote = Self::open_bare(path)?;
        self.add_remote(name, Arc::new(remote))?;
        self.update_config(|c| {
            c.remotes.insert(name.to_string(), path.to_path_buf());
        })
    }

    pub fn remote(&self, name: &str) -> RepoResult<Arc<Repository>> {
        self.remotes
            .read()
            .map_err(|e| RepoError::Config(format!("lock poisoned: {e}")))?
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::UnknownRemote(name.to_string()))
    }

    pub fn remote_names(&self) -> Vec<String> {
        self.remotes
            .read()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }
}
