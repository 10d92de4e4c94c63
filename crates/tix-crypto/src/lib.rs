//! Cryptographic primitives for tix.
//!
//! Provides domain-separated BLAKE3 hashing for objects and operations, and
//! Ed25519 keys used to sign every operation pack commit.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::{ContentHasher, HasherError};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
