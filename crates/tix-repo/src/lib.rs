//! Repository facade for tix.
//!
//! [`Repository`] bundles an object store, a ref store, the local signing key
//! and the Lamport clocks behind the small set of primitives the entity layer
//! is written against: store data and trees, create signed commits, move
//! refs, and query the commit graph. Remotes are other repositories reachable
//! from this process.

pub mod config;
pub mod error;
pub mod repository;

pub use config::{CacheConfig, RepoConfig, SigningConfig, UserConfig};
pub use error::{RepoError, RepoResult};
pub use repository::{Repository, META_DIR};

pub use tix_refs::Namespace;
pub use tix_store::{Commit, Tree, TreeEntry};
pub use tix_types::{EntityId, LamportTime, ObjectId};
