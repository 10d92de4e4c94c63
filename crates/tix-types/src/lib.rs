//! Foundation types for tix.
//!
//! This crate provides the identifier and clock types shared by every other
//! tix crate: content addresses for stored objects, stable identifiers for
//! entities and operations, and the Lamport clocks used to order edits across
//! replicas.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (BLAKE3 hash)
//! - [`EntityId`]: Identifier of an entity, an operation or a comment
//! - [`LamportTime`]: Logical timestamp carried by operation packs
//! - [`LamportClock`]: Thread-safe logical clock producing [`LamportTime`]s

pub mod clock;
pub mod error;
pub mod id;
pub mod object;

pub use clock::{unix_now, LamportClock, LamportTime};
pub use error::TypeError;
pub use id::EntityId;
pub use object::ObjectId;
