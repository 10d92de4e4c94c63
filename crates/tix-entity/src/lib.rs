//! Tickets and identities as signed operation logs.
//!
//! An entity is rebuilt by replaying its operations in order. Operations are
//! batched into packs, each pack is one signed commit, and the commits form
//! a chain under the entity's ref. Concurrent histories are reconciled by
//! [`Entity::merge`], which rebases local packs on top of remote ones.
//!
//! # Key Types
//!
//! - [`Operation`]: One typed mutation with author, time and metadata
//! - [`OperationPack`]: A batch of operations stored as one commit
//! - [`Entity`]: The operation log, generic over the [`Action`] family
//! - [`Bug`] / [`Snapshot`]: A ticket and its compiled state
//! - [`Identity`] / [`IdentitySnapshot`]: An author and its compiled state
//! - [`Workflow`]: Status machine selected by a `workflow:` label

pub mod bug;
pub mod ccb;
pub mod edits;
pub mod entity;
pub mod error;
pub mod identity;
pub mod operation;
pub mod pack;
pub mod review;
pub mod snapshot;
pub mod status;
pub mod timeline;
pub mod workflow;

pub use bug::{Bug, BugAction, Comment};
pub use ccb::{CcbInfo, CcbState};
pub use edits::{LabelChangeResult, LabelChangeStatus};
pub use entity::Entity;
pub use error::{EntityError, EntityResult};
pub use identity::{Identity, IdentityAction, IdentitySnapshot};
pub use operation::{Action, Operation};
pub use pack::OperationPack;
pub use review::{PullRequest, ReviewInfo, Transaction, TransactionKind};
pub use snapshot::{ChecklistSnapshot, Snapshot};
pub use status::Status;
pub use timeline::{TimelineEvent, TimelineItem};
pub use workflow::{find_workflow, workflow_for, workflow_labels, Workflow};
