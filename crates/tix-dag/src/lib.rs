//! Commit graph traversal for tix.
//!
//! Ticket history is a chain of commits in an object store. This crate walks
//! that graph: the first-parent history of a head, the commits one head has
//! that another lacks, the newest ancestor two heads share, and the set of
//! objects a replica is missing.

pub mod error;
pub mod graph;

pub use error::{DagError, DagResult};
pub use graph::CommitGraph;
