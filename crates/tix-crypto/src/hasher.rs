use tix_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"tix-blob-v1"`, `"tix-op-v1"`)
/// that is prepended to every hash computation, so a blob and an operation
/// with identical bytes hash differently.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    pub const BLOB: Self = Self {
        domain: "tix-blob-v1",
    };
    pub const TREE: Self = Self {
        domain: "tix-tree-v1",
    };
    pub const COMMIT: Self = Self {
        domain: "tix-commit-v1",
    };
    /// Hasher for operation identifiers.
    pub const OPERATION: Self = Self {
        domain: "tix-op-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<ObjectId, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let id1 = ContentHasher::BLOB.hash(b"hello world");
        let id2 = ContentHasher::BLOB.hash(b"hello world");
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let blob = ContentHasher::BLOB.hash(data);
        let tree = ContentHasher::TREE.hash(data);
        let op = ContentHasher::OPERATION.hash(data);
        assert_ne!(blob, tree);
        assert_ne!(blob, op);
        assert_ne!(tree, op);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::COMMIT.hash(b"original");
        assert!(ContentHasher::COMMIT.verify(b"original", &id));
        assert!(!ContentHasher::COMMIT.verify(b"tampered", &id));
    }

    #[test]
    fn hash_json_matches_hash_of_bytes() {
        let value = serde_json::json!({"title": "crash on start"});
        let id = ContentHasher::OPERATION.hash_json(&value).unwrap();
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(id, ContentHasher::OPERATION.hash(&bytes));
    }
}
