use thiserror::Error;
use tix_types::EntityId;

use crate::edits::LabelChangeResult;

#[derive(Debug, Error)]
pub enum EntityError {
    /// An operation payload violates its invariants.
    #[error("{0}")]
    Validation(String),

    /// The entity is structurally broken: no Create, several Creates, an
    /// empty or unreadable pack.
    #[error("invalid entity: {0}")]
    Invalid(String),

    /// The workflow rejected a status change.
    #[error("{0}")]
    Transition(String),

    #[error("entity not found: {0}")]
    NotFound(EntityId),

    /// Two histories could not be merged.
    #[error("merge failed: {0}")]
    Merge(String),

    /// A label edit that neither adds nor removes anything.
    #[error("no label added or removed")]
    NoLabelChange(Vec<LabelChangeResult>),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Repo(#[from] tix_repo::RepoError),

    #[error(transparent)]
    Config(#[from] tix_config::ConfigError),

    #[error(transparent)]
    Type(#[from] tix_types::TypeError),
}

impl EntityError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

pub type EntityResult<T> = Result<T, EntityError>;
