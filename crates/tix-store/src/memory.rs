use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tix_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Objects kept in a map, for tests and for replicas that never touch disk.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> RwLockReadGuard<'_, HashMap<ObjectId, StoredObject>> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn objects_mut(&self) -> RwLockWriteGuard<'_, HashMap<ObjectId, StoredObject>> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored objects of `kind`.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.objects().values().filter(|o| o.kind == kind).count()
    }

    /// Every object id, sorted.
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects().keys().copied().collect();
        ids.sort();
        ids
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.objects().get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        self.objects_mut().entry(id).or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects().contains_key(id))
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects_mut().remove(id).is_some())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let objects = self.objects();
        let of = |kind| objects.values().filter(|o| o.kind == kind).count();
        f.debug_struct("InMemoryObjectStore")
            .field("blobs", &of(ObjectKind::Blob))
            .field("trees", &of(ObjectKind::Tree))
            .field("commits", &of(ObjectKind::Commit))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::*;
    use std::sync::Arc;

    fn make_blob(content: &[u8]) -> StoredObject {
        Blob::new(content.to_vec()).to_stored_object()
    }

    #[test]
    fn write_and_read_blob() {
        let store = InMemoryObjectStore::new();
        let id = store.write(&make_blob(b"pack")).unwrap();
        let obj = store.read(&id).unwrap().unwrap();
        assert_eq!(Blob::from_stored_object(&obj).unwrap().data, b"pack");
    }

    #[test]
    fn write_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let a = store.write(&make_blob(b"same")).unwrap();
        let b = store.write(&make_blob(b"same")).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.count(ObjectKind::Blob), 1);
        assert_eq!(store.count(ObjectKind::Commit), 0);
    }

    #[test]
    fn read_required_reports_missing() {
        let store = InMemoryObjectStore::new();
        let missing = ObjectId::from_bytes(b"nope");
        assert!(store.read(&missing).unwrap().is_none());
        assert!(matches!(
            store.read_required(&missing),
            Err(StoreError::NotFound(id)) if id == missing
        ));
    }

    #[test]
    fn delete_present_and_missing() {
        let store = InMemoryObjectStore::new();
        let id = store.write(&make_blob(b"gone")).unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(!store.exists(&id).unwrap());
    }

    #[test]
    fn batch_read_keeps_positions() {
        let store = InMemoryObjectStore::new();
        let ids = store
            .write_batch(&[make_blob(b"a"), make_blob(b"b")])
            .unwrap();
        let mut query = ids.clone();
        query.insert(1, ObjectId::from_bytes(b"missing"));
        let got = store.read_batch(&query).unwrap();
        assert!(got[0].is_some());
        assert!(got[1].is_none());
        assert!(got[2].is_some());
    }

    #[test]
    fn concurrent_writers_share_store() {
        let store = Arc::new(InMemoryObjectStore::new());
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.write(&make_blob(&[i])).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.all_ids().len(), 4);
    }
}
