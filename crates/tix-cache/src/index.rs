//! On-disk excerpt index: one bincode file per entity family.
//!
//! ```text
//! <meta>/cache/bugs.idx        { version: u32, excerpts: map<id, BugExcerpt> }
//! <meta>/cache/identities.idx  { version: u32, excerpts: map<id, IdentityExcerpt> }
//! ```
//!
//! Files are replaced atomically. A file written with another version, or
//! one that fails to decode, is discarded and the caller rebuilds it.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tix_types::EntityId;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};

pub const FORMAT_VERSION: u32 = 1;

pub const BUG_INDEX: &str = "bugs.idx";
pub const IDENTITY_INDEX: &str = "identities.idx";

#[derive(Serialize)]
struct IndexRef<'a, E> {
    version: u32,
    excerpts: &'a BTreeMap<EntityId, E>,
}

#[derive(Deserialize)]
struct IndexFile<E> {
    version: u32,
    excerpts: BTreeMap<EntityId, E>,
}

/// Read an index file. `None` means there is nothing usable on disk.
pub fn load<E: DeserializeOwned>(path: &Path) -> CacheResult<Option<BTreeMap<EntityId, E>>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let version: u32 = match bincode::deserialize(&data) {
        Ok(version) => version,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "discarding unreadable cache index");
            return Ok(None);
        }
    };
    if version != FORMAT_VERSION {
        warn!(
            path = %path.display(),
            version,
            expected = FORMAT_VERSION,
            "discarding cache index with unknown format version"
        );
        return Ok(None);
    }
    match bincode::deserialize::<IndexFile<E>>(&data) {
        Ok(file) => {
            debug!(path = %path.display(), entries = file.excerpts.len(), "cache index loaded");
            Ok(Some(file.excerpts))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "discarding corrupt cache index");
            Ok(None)
        }
    }
}

/// Replace the index file at `path` with `excerpts`.
pub fn store<E: Serialize>(path: &Path, excerpts: &BTreeMap<EntityId, E>) -> CacheResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CacheError::Serialization(format!("no parent dir for {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let data = bincode::serialize(&IndexRef {
        version: FORMAT_VERSION,
        excerpts,
    })
    .map_err(|e| CacheError::Serialization(e.to_string()))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    debug!(path = %path.display(), entries = excerpts.len(), "cache index written");
    Ok(())
}
