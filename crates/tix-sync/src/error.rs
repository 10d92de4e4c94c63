use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("ref rejected: {name}: {reason}")]
    RefRejected { name: String, reason: String },

    #[error("{} merge failure(s):\n{}", .0.len(), .0.join("\n"))]
    MergeFailures(Vec<String>),

    #[error("store error: {0}")]
    Store(#[from] tix_store::StoreError),

    #[error("dag error: {0}")]
    Dag(#[from] tix_dag::DagError),

    #[error(transparent)]
    Repo(#[from] tix_repo::RepoError),

    #[error(transparent)]
    Merge(#[from] tix_merge::MergeError),

    #[error(transparent)]
    Config(#[from] tix_config::ConfigError),
}

pub type SyncResult<T> = Result<T, SyncError>;
