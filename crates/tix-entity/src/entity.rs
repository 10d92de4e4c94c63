//! The generic operation-log entity, its commit chain and its merge.
//!
//! An entity is an ordered list of committed [`OperationPack`]s plus the
//! operations staged since the last commit. The packs form a first-parent
//! commit chain under `refs/<family>/<id>`; the id is the id of the first
//! operation, which must be the only Create.

use tix_repo::{RepoError, Repository};
use tix_types::{EntityId, LamportTime, ObjectId};
use tracing::debug;

use crate::error::{EntityError, EntityResult};
use crate::operation::{Action, Operation};
use crate::pack::OperationPack;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity<A: Action> {
    packs: Vec<OperationPack<A>>,
    staging: Vec<Operation<A>>,
    last_commit: Option<ObjectId>,
}

impl<A: Action> Default for Entity<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action> Entity<A> {
    pub fn new() -> Self {
        Self {
            packs: Vec::new(),
            staging: Vec::new(),
            last_commit: None,
        }
    }

    /// Stage an operation for the next commit. Validation happens on commit.
    pub fn append(&mut self, op: Operation<A>) {
        self.staging.push(op);
    }

    /// Id of the first operation, unset for an empty entity.
    pub fn id(&self) -> EntityId {
        self.first_op().map(Operation::id).unwrap_or_default()
    }

    pub fn first_op(&self) -> Option<&Operation<A>> {
        self.operations().next()
    }

    pub fn last_op(&self) -> Option<&Operation<A>> {
        self.staging
            .last()
            .or_else(|| self.packs.last().and_then(|p| p.operations.last()))
    }

    /// Committed operations in pack order, then the staged ones.
    pub fn operations(&self) -> impl Iterator<Item = &Operation<A>> + '_ {
        self.packs
            .iter()
            .flat_map(|p| p.operations.iter())
            .chain(self.staging.iter())
    }

    pub fn op_count(&self) -> usize {
        self.packs.iter().map(|p| p.operations.len()).sum::<usize>() + self.staging.len()
    }

    pub fn packs(&self) -> &[OperationPack<A>] {
        &self.packs
    }

    pub fn need_commit(&self) -> bool {
        !self.staging.is_empty()
    }

    pub fn last_commit(&self) -> Option<ObjectId> {
        self.last_commit
    }

    pub fn create_time(&self) -> LamportTime {
        self.packs
            .first()
            .and_then(|p| p.create_time)
            .unwrap_or_default()
    }

    pub fn edit_time(&self) -> LamportTime {
        self.packs.last().map(|p| p.edit_time).unwrap_or_default()
    }

    pub fn local_ref(&self) -> String {
        A::NAMESPACE.local_ref(&self.id().to_hex())
    }

    /// Structural checks plus every operation's own validation.
    pub fn validate(&self) -> EntityResult<()> {
        let first = self
            .first_op()
            .ok_or_else(|| EntityError::invalid(format!("{} has no operations", A::TYPENAME)))?;
        if !first.is_create() {
            return Err(EntityError::invalid("first operation should be a Create"));
        }
        if self.operations().skip(1).any(Operation::is_create) {
            return Err(EntityError::invalid("only one Create operation allowed"));
        }
        for op in self.operations() {
            op.validate()?;
        }
        Ok(())
    }

    /// Write the staged operations as a new pack and move the ref to it.
    ///
    /// Does nothing when nothing is staged. Staged operations are kept if
    /// any step fails.
    pub fn commit(&mut self, repo: &Repository) -> EntityResult<()> {
        if self.staging.is_empty() {
            return Ok(());
        }
        if !repo.signing_enabled() {
            return Err(RepoError::SigningDisabled.into());
        }
        self.validate()?;

        let create_time = if self.packs.is_empty() {
            Some(repo.increment_clock(&A::create_clock())?)
        } else {
            None
        };
        let edit_time = repo.increment_clock(&A::edit_clock())?;
        let mut pack = OperationPack {
            operations: self.staging.clone(),
            create_time,
            edit_time,
            commit: None,
        };
        let commit = pack.write(repo, self.last_commit)?;
        repo.update_ref(&self.local_ref(), commit)?;

        pack.commit = Some(commit);
        debug!(
            id = %self.id().human(),
            ops = pack.operations.len(),
            commit = %commit.short_hex(),
            "committed {}",
            A::TYPENAME
        );
        self.packs.push(pack);
        self.staging.clear();
        self.last_commit = Some(commit);
        Ok(())
    }

    /// Commit only if something is staged.
    pub fn commit_as_needed(&mut self, repo: &Repository) -> EntityResult<()> {
        if self.need_commit() {
            self.commit(repo)?;
        }
        Ok(())
    }

    /// Take `other`'s committed history, keeping the operations staged here
    /// on top of it.
    pub fn reload(&mut self, other: Self) {
        let staged = std::mem::take(&mut self.staging);
        *self = other;
        self.staging.extend(staged);
    }

    // ---- reading ----

    /// Replay the pack chain behind `ref_name`.
    pub fn read(repo: &Repository, ref_name: &str) -> EntityResult<Self> {
        let head = repo.resolve_ref(ref_name)?;
        let mut packs = Vec::new();
        for commit in repo.chain(&head)? {
            packs.push(OperationPack::read(repo, &commit)?);
        }
        let entity = Self {
            packs,
            staging: Vec::new(),
            last_commit: Some(head),
        };
        entity.validate()?;

        let expected = A::NAMESPACE.suffix(ref_name);
        if expected != Some(entity.id().to_hex().as_str()) {
            return Err(EntityError::invalid(format!(
                "ref {ref_name} does not match the entity id {}",
                entity.id()
            )));
        }

        repo.witness_clock(&A::create_clock(), entity.create_time())?;
        repo.witness_clock(&A::edit_clock(), entity.edit_time())?;
        Ok(entity)
    }

    pub fn read_local(repo: &Repository, id: EntityId) -> EntityResult<Self> {
        Self::read_existing(repo, &A::NAMESPACE.local_ref(&id.to_hex()), id)
    }

    pub fn read_remote(repo: &Repository, remote: &str, id: EntityId) -> EntityResult<Self> {
        Self::read_existing(repo, &A::NAMESPACE.remote_ref(remote, &id.to_hex()), id)
    }

    fn read_existing(repo: &Repository, ref_name: &str, id: EntityId) -> EntityResult<Self> {
        if !repo.ref_exists(ref_name)? {
            return Err(EntityError::NotFound(id));
        }
        Self::read(repo, ref_name)
    }

    pub fn list_local_ids(repo: &Repository) -> EntityResult<Vec<EntityId>> {
        let ns = A::NAMESPACE;
        let mut ids = Vec::new();
        for name in repo.list_refs(&ns.local_prefix())? {
            if let Some(suffix) = ns.suffix(&name) {
                ids.push(EntityId::from_hex(suffix)?);
            }
        }
        Ok(ids)
    }

    /// Every local entity, one result per ref. A broken entity does not
    /// stop the iteration.
    pub fn read_all_local(repo: &Repository) -> impl Iterator<Item = EntityResult<Self>> + '_ {
        Self::read_all(repo, A::NAMESPACE.local_prefix())
    }

    pub fn read_all_remote<'a>(
        repo: &'a Repository,
        remote: &str,
    ) -> impl Iterator<Item = EntityResult<Self>> + 'a {
        Self::read_all(repo, A::NAMESPACE.remote_prefix(remote))
    }

    fn read_all(repo: &Repository, prefix: String) -> impl Iterator<Item = EntityResult<Self>> + '_ {
        let (names, error) = match repo.list_refs(&prefix) {
            Ok(names) => (names, None),
            Err(e) => (Vec::new(), Some(EntityError::from(e))),
        };
        error
            .into_iter()
            .map(Err)
            .chain(names.into_iter().map(move |name| Self::read(repo, &name)))
    }

    // ---- ref management ----

    /// Delete the local ref and every remote-tracking ref of `id`.
    pub fn remove(repo: &Repository, id: EntityId) -> EntityResult<()> {
        let ns = A::NAMESPACE;
        let hex = id.to_hex();
        let local = ns.local_ref(&hex);
        if !repo.ref_exists(&local)? {
            return Err(EntityError::NotFound(id));
        }
        repo.remove_ref(&local)?;
        for name in repo.list_refs("refs/remotes/")? {
            if ns.suffix(&name) == Some(hex.as_str()) {
                repo.remove_ref(&name)?;
            }
        }
        debug!(id = %id.human(), "removed {}", A::TYPENAME);
        Ok(())
    }

    /// Point the local ref back at the remote-tracking one, dropping local
    /// history the remote does not have.
    pub fn reset(repo: &Repository, remote: &str, id: EntityId) -> EntityResult<()> {
        let ns = A::NAMESPACE;
        let remote_ref = ns.remote_ref(remote, &id.to_hex());
        if !repo.ref_exists(&remote_ref)? {
            return Err(EntityError::NotFound(id));
        }
        repo.copy_ref(&remote_ref, &ns.local_ref(&id.to_hex()))?;
        Ok(())
    }

    // ---- merge ----

    /// Integrate the history of `other`, a committed view of the same entity.
    ///
    /// Packs after the common ancestor that only exist locally are re-signed
    /// on top of `other`'s head, in their original order. Returns `false`
    /// when `other` brings nothing new.
    pub fn merge(&mut self, repo: &Repository, other: &Self) -> EntityResult<bool> {
        if self.id() != other.id() {
            return Err(EntityError::Merge(format!(
                "different entities: {} and {}",
                self.id().human(),
                other.id().human()
            )));
        }
        if other.need_commit() {
            return Err(EntityError::Merge(
                "the other side has uncommitted operations".into(),
            ));
        }
        let (Some(local_head), Some(other_head)) = (self.last_commit, other.last_commit) else {
            return Err(EntityError::Merge("both sides must be committed".into()));
        };

        let ancestor = repo
            .find_common_ancestor(&local_head, &other_head)?
            .ok_or_else(|| EntityError::Merge("no common ancestor".into()))?;
        if ancestor == other_head {
            return Ok(false);
        }

        let position = |packs: &[OperationPack<A>]| {
            packs
                .iter()
                .position(|p| p.commit == Some(ancestor))
                .ok_or_else(|| EntityError::Merge("common ancestor is not a pack".into()))
        };
        let local_at = position(&self.packs)?;
        let other_at = position(&other.packs)?;

        let mut packs: Vec<_> = other.packs.clone();
        let mut head = other_head;
        for pack in &self.packs[local_at + 1..] {
            let mut rebased = pack.clone();
            let commit = rebased.write(repo, Some(head))?;
            rebased.commit = Some(commit);
            packs.push(rebased);
            head = commit;
        }
        repo.update_ref(&self.local_ref(), head)?;

        debug!(
            id = %self.id().human(),
            received = other.packs.len() - other_at - 1,
            rebased = self.packs.len() - local_at - 1,
            "merged {}",
            A::TYPENAME
        );
        self.packs = packs;
        self.last_commit = Some(head);
        Ok(true)
    }
}
