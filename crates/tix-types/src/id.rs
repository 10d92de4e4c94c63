use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectId;

/// Stable identifier of an entity, an operation or a comment.
///
/// An entity's id is the id of its first operation, and an operation's id is
/// the hash of its serialized form. Comments reuse the id of the operation
/// that created them. The all-zero value means "not computed yet".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EntityId([u8; 32]);

impl EntityId {
    /// Number of hex characters shown to humans.
    pub const HUMAN_LEN: usize = 7;

    pub const fn unset() -> Self {
        Self([0u8; 32])
    }

    pub fn is_unset(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn from_object(id: ObjectId) -> Self {
        Self(*id.as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated form used in listings.
    pub fn human(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(Self::HUMAN_LEN);
        s
    }

    /// Returns `true` if the hex form starts with `prefix` (case-insensitive).
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        ObjectId::from_hex(s).map(Self::from_object)
    }

    /// Error if the id has not been computed.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.is_unset() {
            return Err(TypeError::UnsetId);
        }
        Ok(())
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.human())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for EntityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for EntityId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_is_unset() {
        let id = EntityId::default();
        assert!(id.is_unset());
        assert_eq!(id.validate(), Err(TypeError::UnsetId));
    }

    #[test]
    fn human_is_seven_chars() {
        let id = EntityId::from_object(ObjectId::from_bytes(b"ticket"));
        assert_eq!(id.human().len(), EntityId::HUMAN_LEN);
        assert!(id.to_hex().starts_with(&id.human()));
    }

    #[test]
    fn prefix_match_ignores_case() {
        let id = EntityId::from_hash([0xab; 32]);
        assert!(id.has_prefix("ABAB"));
        assert!(id.has_prefix(""));
        assert!(!id.has_prefix("abac"));
    }

    proptest! {
        #[test]
        fn hex_parse_inverts_display(bytes in proptest::array::uniform32(any::<u8>())) {
            let id = EntityId::from_hash(bytes);
            prop_assert_eq!(id.to_string().parse::<EntityId>().unwrap(), id);
        }
    }
}
