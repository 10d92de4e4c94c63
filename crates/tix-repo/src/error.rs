use std::path::PathBuf;

use thiserror::Error;
use tix_types::ObjectId;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("repository not initialized at {0}")]
    NotInitialized(PathBuf),

    #[error("repository already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    /// Commits must be signed but this repository has no signing key.
    #[error("signing is disabled for this repository; refusing to write unsigned commits")]
    SigningDisabled,

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("unknown remote: {0}")]
    UnknownRemote(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("signing key error: {0}")]
    Key(#[from] tix_crypto::SignatureError),

    #[error("store error: {0}")]
    Store(#[from] tix_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] tix_refs::RefError),

    #[error("graph error: {0}")]
    Dag(#[from] tix_dag::DagError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;
