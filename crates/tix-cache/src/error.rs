use thiserror::Error;
use tix_types::EntityId;

fn id_list(ids: &[EntityId]) -> String {
    ids.iter().map(EntityId::human).collect::<Vec<_>>().join("\n")
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{kind} not found")]
    NotFound { kind: &'static str },

    #[error("multiple matching {kind} found:\n{}", id_list(.ids))]
    MultipleMatch {
        kind: &'static str,
        ids: Vec<EntityId>,
    },

    #[error("{kind} {} already exists in the cache", .id.human())]
    AlreadyExists { kind: &'static str, id: EntityId },

    /// The handle was dropped from the cache and can no longer be mutated.
    #[error("{} was evicted from the cache", .0.human())]
    Evicted(EntityId),

    #[error("the repository you want to access is already locked by the process pid {pid}")]
    AlreadyLocked { pid: u32 },

    #[error("invalid lock file: {0}")]
    LockFile(String),

    #[error("no user identity is set for this repository")]
    NoUserIdentity,

    #[error("no matching operation found")]
    NoMatchingOp,

    /// New ticket options that fail validation.
    #[error("{0}")]
    InvalidOptions(String),

    #[error("index serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Entity(#[from] tix_entity::EntityError),

    #[error(transparent)]
    Repo(#[from] tix_repo::RepoError),

    #[error(transparent)]
    Config(#[from] tix_config::ConfigError),

    #[error(transparent)]
    Merge(#[from] tix_merge::MergeError),

    #[error(transparent)]
    Sync(#[from] tix_sync::SyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
