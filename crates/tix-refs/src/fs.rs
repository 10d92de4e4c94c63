//! File-per-ref store.
//!
//! A ref named `refs/bugs/<id>` is the file `<root>/refs/bugs/<id>` holding
//! the target's hex id and a newline. Updates are written to a temporary file
//! and renamed into place.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tix_types::ObjectId;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::RefStore;

/// A [`RefStore`] persisted as plain files.
#[derive(Debug, Clone)]
pub struct FsRefStore {
    root: PathBuf,
}

impl FsRefStore {
    /// `root` is the directory that contains `refs/`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("refs"))?;
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        name.split('/').fold(self.root.clone(), |p, c| p.join(c))
    }

    fn name_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

impl RefStore for FsRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let content = match fs::read_to_string(self.path_for(name)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        ObjectId::from_hex(content.trim())
            .map(Some)
            .map_err(|e| RefError::Corrupt {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }

    fn write_ref(&self, name: &str, target: ObjectId) -> Result<()> {
        validate_ref_name(name)?;
        let path = self.path_for(name);
        let dir = path.parent().ok_or_else(|| RefError::InvalidName {
            name: name.to_string(),
            reason: "no parent directory".into(),
        })?;
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        writeln!(tmp, "{}", target.to_hex())?;
        tmp.persist(&path).map_err(|e| RefError::Io(e.error))?;
        debug!(name, target = %target.short_hex(), "ref updated");
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let mut result = Vec::new();
        for entry in WalkDir::new(self.root.join("refs")) {
            let entry = entry.map_err(|e| RefError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = self.name_for(entry.path()) else {
                continue;
            };
            // leftovers of an interrupted write
            if !name.starts_with(prefix) || validate_ref_name(&name).is_err() {
                continue;
            }
            if let Some(target) = self.read_ref(&name)? {
                result.push((name, target));
            }
        }
        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(result)
    }
}
