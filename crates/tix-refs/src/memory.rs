//! In-memory reference store for testing and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tix_types::ObjectId;

use crate::error::{RefError, Result};
use crate::names::validate_ref_name;
use crate::traits::RefStore;

/// An in-memory implementation of [`RefStore`].
///
/// All data lives in a `BTreeMap` behind a `RwLock`, so listings come out
/// sorted for free. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<String, ObjectId>>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefStore for InMemoryRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let refs = self
            .refs
            .read()
            .map_err(|e| RefError::Poisoned(e.to_string()))?;
        Ok(refs.get(name).copied())
    }

    fn write_ref(&self, name: &str, target: ObjectId) -> Result<()> {
        validate_ref_name(name)?;
        let mut refs = self
            .refs
            .write()
            .map_err(|e| RefError::Poisoned(e.to_string()))?;
        refs.insert(name.to_string(), target);
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let mut refs = self
            .refs
            .write()
            .map_err(|e| RefError::Poisoned(e.to_string()))?;
        Ok(refs.remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        let refs = self
            .refs
            .read()
            .map_err(|e| RefError::Poisoned(e.to_string()))?;
        Ok(refs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_hash([byte; 32])
    }

    #[test]
    fn write_read_delete() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/bugs/a", oid(1)).unwrap();
        assert_eq!(store.read_ref("refs/bugs/a").unwrap(), Some(oid(1)));
        store.write_ref("refs/bugs/a", oid(2)).unwrap();
        assert_eq!(store.read_ref("refs/bugs/a").unwrap(), Some(oid(2)));
        assert!(store.delete_ref("refs/bugs/a").unwrap());
        assert!(!store.delete_ref("refs/bugs/a").unwrap());
        assert_eq!(store.read_ref("refs/bugs/a").unwrap(), None);
    }

    #[test]
    fn invalid_name_is_rejected() {
        let store = InMemoryRefStore::new();
        assert!(matches!(
            store.write_ref("bugs/a", oid(1)),
            Err(RefError::InvalidName { .. })
        ));
    }

    #[test]
    fn list_by_prefix_is_sorted() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/bugs/c", oid(3)).unwrap();
        store.write_ref("refs/bugs/a", oid(1)).unwrap();
        store.write_ref("refs/identities/b", oid(2)).unwrap();
        let names: Vec<_> = store
            .list_refs("refs/bugs/")
            .unwrap()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["refs/bugs/a", "refs/bugs/c"]);
        assert_eq!(store.list_refs("").unwrap().len(), 3);
    }

    #[test]
    fn remotes_are_derived_from_tracking_refs() {
        let store = InMemoryRefStore::new();
        store.write_ref("refs/remotes/origin/bugs/a", oid(1)).unwrap();
        store.write_ref("refs/remotes/origin/bugs/b", oid(1)).unwrap();
        store.write_ref("refs/remotes/backup/bugs/a", oid(1)).unwrap();
        assert_eq!(store.remotes().unwrap(), vec!["backup", "origin"]);
    }
}
