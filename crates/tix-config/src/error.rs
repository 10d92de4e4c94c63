use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The label is not part of the label configuration.
    #[error("Label {0} does not exist")]
    UnknownLabel(String),

    /// A label or label prefix with this name is already configured.
    #[error("a label with name {0} is already allocated")]
    LabelAllocated(String),

    /// The same label appears twice in the label configuration.
    #[error("duplicated rule for label {0} in configuration")]
    DuplicateLabel(String),

    /// No checklist template exists for this label.
    #[error("invalid checklist {0}")]
    InvalidChecklist(String),

    /// Text that names no checklist state.
    #[error("invalid checklist state {0}")]
    InvalidState(String),

    /// A label fails validation.
    #[error("invalid label: {0}")]
    InvalidLabel(String),

    /// A config commit does not hold the expected blob.
    #[error("config {name} is malformed: {reason}")]
    Malformed { name: String, reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Repo(#[from] tix_repo::RepoError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
