//! Error types for commit graph walks.

use tix_types::ObjectId;

#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A referenced commit was not found in the store.
    #[error("commit not found: {0}")]
    CommitNotFound(ObjectId),

    /// A cycle was detected, which violates the DAG invariant.
    #[error("cycle detected involving commit {0}")]
    CycleDetected(ObjectId),

    #[error("store error: {0}")]
    Store(#[from] tix_store::StoreError),
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
