//! Operation packs: batches of operations stored as one signed commit.
//!
//! A pack commit's tree holds a single `ops` blob:
//!
//! ```json
//! { "version": 1, "create_time": 1, "edit_time": 4, "ops": [ ... ] }
//! ```
//!
//! `create_time` is only present on the first pack of an entity.

use serde::{Deserialize, Serialize};
use tix_repo::{Repository, TreeEntry};
use tix_types::{LamportTime, ObjectId};

use crate::error::{EntityError, EntityResult};
use crate::operation::{Action, Operation};

const OPS_BLOB: &str = "ops";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(bound = "A: Action")]
struct PackOut<'a, A> {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    create_time: Option<LamportTime>,
    edit_time: LamportTime,
    ops: &'a [Operation<A>],
}

#[derive(Deserialize)]
#[serde(bound = "A: Action")]
struct PackIn<A> {
    version: u32,
    #[serde(default)]
    create_time: Option<LamportTime>,
    edit_time: LamportTime,
    ops: Vec<Operation<A>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationPack<A: Action> {
    pub operations: Vec<Operation<A>>,
    pub create_time: Option<LamportTime>,
    pub edit_time: LamportTime,
    /// The commit holding this pack, once written.
    pub commit: Option<ObjectId>,
}

impl<A: Action> OperationPack<A> {
    /// Store the pack as a commit on top of `parent` and return the commit id.
    ///
    /// Writing the same pack twice yields the same tree, so a rebased pack
    /// only differs from the original by its parent and signature.
    pub fn write(&self, repo: &Repository, parent: Option<ObjectId>) -> EntityResult<ObjectId> {
        let out = PackOut {
            version: FORMAT_VERSION,
            create_time: self.create_time,
            edit_time: self.edit_time,
            ops: &self.operations,
        };
        let blob = repo.store_data(&serde_json::to_vec(&out)?)?;
        let tree = repo.store_tree(vec![TreeEntry::blob(OPS_BLOB, blob)])?;
        let commit = match parent {
            Some(parent) => repo.store_commit_with_parent(tree, parent)?,
            None => repo.store_commit(tree)?,
        };
        Ok(commit)
    }

    /// Load the pack stored in `commit`, checking its signature.
    pub fn read(repo: &Repository, commit: &ObjectId) -> EntityResult<Self> {
        let stored = repo.read_commit(commit)?;
        let tree = repo.read_tree(&stored.tree)?;
        let entry = tree.get(OPS_BLOB).ok_or_else(|| {
            EntityError::invalid(format!("pack {} has no {OPS_BLOB} blob", commit.short_hex()))
        })?;
        let data = repo.read_data(&entry.object_id)?;
        let pack: PackIn<A> = serde_json::from_slice(&data).map_err(|e| {
            EntityError::invalid(format!("pack {} is unreadable: {e}", commit.short_hex()))
        })?;
        if pack.version != FORMAT_VERSION {
            return Err(EntityError::invalid(format!(
                "pack {} has unsupported version {}",
                commit.short_hex(),
                pack.version
            )));
        }
        if pack.ops.is_empty() {
            return Err(EntityError::invalid(format!(
                "pack {} is empty",
                commit.short_hex()
            )));
        }
        Ok(Self {
            operations: pack.ops,
            create_time: pack.create_time,
            edit_time: pack.edit_time,
            commit: Some(*commit),
        })
    }
}
