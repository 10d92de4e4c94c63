//! Reference management for tix.
//!
//! Refs are named, mutable pointers to commits. Every entity family owns a
//! namespace: a ticket lives at `refs/bugs/<id>`, its copy fetched from a
//! remote at `refs/remotes/<remote>/bugs/<id>`.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`traits`]: The [`RefStore`] trait defining the storage interface
//! - [`names`]: Ref and remote name validation
//! - [`namespace`]: Per-family ref layout ([`Namespace`])
//! - [`refspec`]: Source/destination ref mappings used by fetch and push
//! - [`memory`]: In-memory [`InMemoryRefStore`] for tests
//! - [`fs`]: File-per-ref [`FsRefStore`]

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod namespace;
pub mod refspec;
pub mod traits;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::{validate_ref_name, validate_remote_name};
pub use namespace::Namespace;
pub use refspec::RefSpec;
pub use traits::RefStore;
