//! Merging remote entity histories into the local repository.
//!
//! After a fetch, each remote-tracking ref of an entity family is compared
//! with its local counterpart: missing entities are copied, behind ones are
//! fast-forwarded, and diverged ones are rebased (see
//! [`tix_entity::Entity::merge`]). [`merge_all`] runs this over a whole
//! family on a producer thread and streams one [`MergeResult`] per ref.

pub mod error;
pub mod merge;

pub use error::MergeError;
pub use merge::{merge_all, merge_ref, MergeOutcome, MergeResult, MergeStream, Mergeable};
