//! Moving entity histories between replicas.
//!
//! A remote is another [`tix_repo::Repository`]. [`fetch`] copies the
//! objects behind the remote's identity, bug and config refs and mirrors
//! those refs under `refs/remotes/<remote>/`. [`push`] does the reverse for
//! local refs, fast-forward only. [`pull`] is a fetch followed by the merge
//! of every tracking ref; [`pull_with`] reports each step to [`PullHooks`].

pub mod error;
pub mod sync;
pub mod types;

pub use error::{SyncError, SyncResult};
pub use sync::{fetch, merge_with, pull, pull_with, push, push_removal, PullHooks, FAMILIES};
pub use types::{
    FetchResult, MergeReport, MergeSummary, PullResult, PushResult, RefRejection, RefUpdate,
};
