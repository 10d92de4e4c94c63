//! The repository cache for tix.
//!
//! Reading a ticket means replaying its whole operation log, which is too
//! slow for listing and searching. The cache keeps a compact excerpt of
//! every ticket and identity, persisted as a versioned bincode index under
//! `.tix/cache/`, and loads full entities only on demand.
//!
//! # Key Types
//!
//! - [`RepoCache`]: Entry point: resolution, queries, creation and sync
//! - [`BugCache`]: A loaded ticket; every edit goes through it
//! - [`IdentityCache`]: A loaded identity
//! - [`BugExcerpt`] / [`IdentityExcerpt`]: Index entries
//! - [`Query`] / [`Filter`]: Ticket queries over excerpts

pub mod bug_cache;
pub mod error;
pub mod excerpt;
pub mod identity_cache;
pub mod index;
pub mod lock;
mod lru;
pub mod query;
pub mod repo_cache;
mod state;

pub use bug_cache::BugCache;
pub use error::{CacheError, CacheResult};
pub use excerpt::{BugExcerpt, IdentityExcerpt};
pub use identity_cache::IdentityCache;
pub use lock::LockFile;
pub use query::{Direction, Filter, OrderBy, Query};
pub use repo_cache::{NewBugOpts, RepoCache, CACHE_DIR};
pub use tix_sync::MergeReport;
