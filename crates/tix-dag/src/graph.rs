//! Walks over the commit graph stored in an [`ObjectStore`].
//!
//! # Invariants
//!
//! - The graph is acyclic: a commit's id covers its parents' ids.
//! - Entity histories only ever follow first parents.

use std::collections::{HashSet, VecDeque};

use tix_store::{Commit, ObjectKind, ObjectStore, StoreError, Tree};
use tix_types::ObjectId;
use tracing::debug;

use crate::error::{DagError, DagResult};

/// Read-only view of the commits in an object store.
pub struct CommitGraph<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> CommitGraph<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Decode the commit `id` without checking its signature.
    pub fn commit(&self, id: &ObjectId) -> DagResult<Commit> {
        let obj = self
            .store
            .read(id)?
            .ok_or(DagError::CommitNotFound(*id))?;
        Ok(Commit::from_stored_object(&obj)?)
    }

    /// First-parent history ending at `head`, oldest first.
    pub fn chain(&self, head: &ObjectId) -> DagResult<Vec<ObjectId>> {
        let mut seen = HashSet::new();
        let mut chain = Vec::new();
        let mut current = Some(*head);
        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(DagError::CycleDetected(id));
            }
            chain.push(id);
            current = self.commit(&id)?.parent();
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every commit reachable from `id`, including `id` itself.
    pub fn ancestors(&self, id: &ObjectId) -> DagResult<HashSet<ObjectId>> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(*id);
        queue.push_back(*id);

        while let Some(current) = queue.pop_front() {
            for parent in self.commit(&current)?.parents {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(visited)
    }

    /// Returns `true` if `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> DagResult<bool> {
        Ok(self.ancestors(descendant)?.contains(ancestor))
    }

    /// Commits reachable from `head` but not from `base`, parents before
    /// children. With no base every ancestor of `head` is returned.
    pub fn commits_between(
        &self,
        base: Option<&ObjectId>,
        head: &ObjectId,
    ) -> DagResult<Vec<ObjectId>> {
        let excluded = match base {
            Some(base) => self.ancestors(base)?,
            None => HashSet::new(),
        };

        // iterative post-order DFS gives parents before children
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut on_path = HashSet::new();
        let mut stack = vec![(*head, false)];
        while let Some((id, expanded)) = stack.pop() {
            if excluded.contains(&id) || done.contains(&id) {
                continue;
            }
            if expanded {
                on_path.remove(&id);
                done.insert(id);
                order.push(id);
                continue;
            }
            if !on_path.insert(id) {
                return Err(DagError::CycleDetected(id));
            }
            stack.push((id, true));
            for parent in self.commit(&id)?.parents.into_iter().rev() {
                stack.push((parent, false));
            }
        }
        debug!(head = %head.short_hex(), count = order.len(), "commits between");
        Ok(order)
    }

    /// The newest commit reachable from both `a` and `b`.
    ///
    /// Uses the ancestor-set intersection approach: collect the ancestors of
    /// `b`, then walk `a`'s history nearest-first and return the first one
    /// that is shared.
    pub fn find_common_ancestor(
        &self,
        a: &ObjectId,
        b: &ObjectId,
    ) -> DagResult<Option<ObjectId>> {
        if a == b {
            return Ok(Some(*a));
        }
        let ancestors_b = self.ancestors(b)?;

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(*a);
        queue.push_back(*a);
        while let Some(current) = queue.pop_front() {
            if ancestors_b.contains(&current) {
                return Ok(Some(current));
            }
            for parent in self.commit(&current)?.parents {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(None)
    }

    /// Objects (commits, trees, blobs) reachable from `head` for which
    /// `known` returns `false`. The walk stops at known commits, since
    /// everything behind a known commit is known too.
    pub fn missing_objects<F>(&self, head: &ObjectId, known: F) -> DagResult<Vec<ObjectId>>
    where
        F: Fn(&ObjectId) -> Result<bool, StoreError>,
    {
        let mut missing = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([(*head, ObjectKind::Commit)]);
        while let Some((id, kind)) = queue.pop_front() {
            if !visited.insert(id) || known(&id)? {
                continue;
            }
            missing.push(id);
            match kind {
                ObjectKind::Commit => {
                    let commit = self.commit(&id)?;
                    queue.push_back((commit.tree, ObjectKind::Tree));
                    for parent in commit.parents {
                        queue.push_back((parent, ObjectKind::Commit));
                    }
                }
                ObjectKind::Tree => {
                    let obj = self
                        .store
                        .read(&id)?
                        .ok_or(StoreError::NotFound(id))?;
                    for entry in Tree::from_stored_object(&obj)?.entries {
                        queue.push_back((entry.object_id, entry.kind));
                    }
                }
                ObjectKind::Blob => {}
            }
        }
        Ok(missing)
    }
}
