//! The [`RefStore`] trait defining the reference storage interface.

use tix_types::ObjectId;

use crate::error::Result;

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`) and provide atomic
/// read/write/delete operations on named refs. Names are canonical, e.g.
/// `refs/bugs/<id>` or `refs/remotes/origin/bugs/<id>`.
pub trait RefStore: Send + Sync {
    /// Returns `Ok(None)` if the ref does not exist.
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Create or move a ref.
    fn write_ref(&self, name: &str, target: ObjectId) -> Result<()>;

    /// Returns `Ok(true)` if the ref existed and was deleted.
    fn delete_ref(&self, name: &str) -> Result<bool>;

    /// List all refs whose canonical name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>>;

    /// List all known remote names.
    fn remotes(&self) -> Result<Vec<String>> {
        let refs = self.list_refs("refs/remotes/")?;
        let mut remotes: Vec<String> = refs
            .iter()
            .filter_map(|(name, _)| {
                let rest = name.strip_prefix("refs/remotes/")?;
                let remote = rest.split('/').next()?;
                Some(remote.to_string())
            })
            .collect();
        remotes.sort();
        remotes.dedup();
        Ok(remotes)
    }
}
