use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Entity(#[from] tix_entity::EntityError),

    #[error(transparent)]
    Repo(#[from] tix_repo::RepoError),

    /// The producer thread could not be started.
    #[error("failed to start merge: {0}")]
    Spawn(#[from] std::io::Error),
}
