//! Content-addressed object storage for tix.
//!
//! A hash-keyed object store analogous to git's `.git/objects/` directory.
//! Ticket history is made only of three object kinds, each identified by its
//! domain-separated BLAKE3 hash:
//!
//! - [`Blob`] -- raw content (a serialized operation pack, a config file)
//! - [`Tree`] -- named references to other objects
//! - [`Commit`] -- a tree plus parent commits, signed by its author
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- one file per object under a directory, written atomically
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Concurrent reads are always safe.
//! 3. The store never interprets object contents -- it is a pure key-value store.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, Commit, CommitSignature, ObjectKind, StoredObject, Tree, TreeEntry};
pub use traits::ObjectStore;
