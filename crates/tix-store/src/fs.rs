//! Filesystem object store.
//!
//! Objects live at `<root>/<first 2 hex>/<remaining 62 hex>`, each file a
//! bincode-encoded `(kind, data)` pair. Writes go through a temporary file in
//! the same directory and are renamed into place, so readers never observe a
//! partial object.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tix_types::ObjectId;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

#[derive(Serialize, Deserialize)]
struct DiskObject {
    kind: ObjectKind,
    data: Vec<u8>,
}

/// Object store backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let bytes = match fs::read(self.path_for(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let disk: DiskObject = bincode::deserialize(&bytes).map_err(|e| {
            StoreError::CorruptObject {
                id: *id,
                reason: e.to_string(),
            }
        })?;
        let object = StoredObject::new(disk.kind, disk.data);
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Some(object))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.path_for(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Serialization("object path has no parent".into()))?;
        fs::create_dir_all(dir)?;

        let bytes = bincode::serialize(&DiskObject {
            kind: object.kind,
            data: object.data.clone(),
        })
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        debug!(id = %id.short_hex(), kind = %object.kind, len = object.size, "object written");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.path_for(id).exists())
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
