use tix_config::ConfigUpdate;
use tix_merge::{MergeOutcome, MergeResult};
use tix_types::{EntityId, ObjectId};

use crate::error::SyncError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefUpdate {
    pub name: String,
    pub old: Option<ObjectId>,
    pub new: ObjectId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefRejection {
    pub name: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default)]
pub struct FetchResult {
    pub objects_received: usize,
    pub refs_updated: Vec<RefUpdate>,
    /// Tracking refs whose entity is gone from the remote.
    pub refs_pruned: Vec<String>,
    /// Local refs deleted along with a pruned tracking ref.
    pub refs_removed: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PushResult {
    pub objects_sent: usize,
    pub refs_updated: Vec<RefUpdate>,
    pub rejected: Vec<RefRejection>,
}

impl PushResult {
    /// Fail on the first rejected ref.
    pub fn into_result(self) -> Result<Self, SyncError> {
        match self.rejected.first() {
            None => Ok(self),
            Some(r) => Err(SyncError::RefRejected {
                name: r.name.clone(),
                reason: r.reason.clone(),
            }),
        }
    }
}

/// Per-family tally of a merge pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub new: Vec<EntityId>,
    pub updated: Vec<EntityId>,
    pub unchanged: usize,
}

impl MergeSummary {
    /// Count one merge result. Failures are formatted as
    /// `merge failure for <kind> <id>: <reason>` and pushed to `failures`.
    pub fn record<E>(&mut self, result: &MergeResult<E>, kind: &str, failures: &mut Vec<String>) {
        if let Some(reason) = result.failure() {
            failures.push(format!("merge failure for {kind} {}: {reason}", result.id.human()));
            return;
        }
        match &result.outcome {
            Ok(MergeOutcome::New(_)) => self.new.push(result.id),
            Ok(MergeOutcome::Updated(_)) => self.updated.push(result.id),
            _ => self.unchanged += 1,
        }
    }
}

/// Outcome of merging every tracking ref of one remote.
#[derive(Clone, Debug, Default)]
pub struct MergeReport {
    pub identities: MergeSummary,
    pub bugs: MergeSummary,
    pub failures: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct PullResult {
    pub fetch: FetchResult,
    pub identities: MergeSummary,
    pub bugs: MergeSummary,
    pub configs: Vec<ConfigUpdate>,
    /// `merge failure for <kind> <id>: <reason>`, one per failed ref.
    pub failures: Vec<String>,
}

impl PullResult {
    /// Turn recorded merge failures into an error.
    pub fn into_result(self) -> Result<Self, SyncError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(SyncError::MergeFailures(self.failures))
        }
    }
}
