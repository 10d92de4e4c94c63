//! Operations: the atomic, typed mutations an entity is made of.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tix_crypto::ContentHasher;
use tix_repo::Namespace;
use tix_types::EntityId;

use crate::error::{EntityError, EntityResult};

/// The payload of an operation for one entity family.
///
/// Implementors are internally tagged serde enums so that an [`Operation`]
/// flattens into a single JSON object.
pub trait Action:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Where entities of this family live.
    const NAMESPACE: Namespace;

    /// Human name of the family, used in messages.
    const TYPENAME: &'static str;

    fn is_create(&self) -> bool;

    fn validate(&self) -> EntityResult<()>;

    /// Whether operations must carry an author. Identities create themselves.
    fn requires_author() -> bool {
        true
    }

    fn create_clock() -> String {
        format!("{}-create", Self::NAMESPACE.family())
    }

    fn edit_clock() -> String {
        format!("{}-edit", Self::NAMESPACE.family())
    }
}

/// One mutation: who, when, what, plus free-form metadata.
///
/// The id hashes everything except the metadata, so metadata can be attached
/// after the fact without changing identity. It is computed on first use and
/// cached; the fields are read-only for that reason.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "A: Action")]
pub struct Operation<A> {
    author: EntityId,
    #[serde(rename = "timestamp")]
    unix_time: i64,
    /// Random salt so that two identical edits in the same second differ.
    #[serde(default)]
    nonce: u64,
    #[serde(flatten)]
    action: A,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
    #[serde(skip)]
    id: OnceLock<EntityId>,
}

#[derive(Serialize)]
struct IdView<'a, A> {
    author: &'a EntityId,
    timestamp: i64,
    nonce: u64,
    #[serde(flatten)]
    action: &'a A,
}

impl<A: Action> Operation<A> {
    pub fn new(author: EntityId, unix_time: i64, action: A) -> Self {
        Self {
            author,
            unix_time,
            nonce: rand::random(),
            action,
            metadata: BTreeMap::new(),
            id: OnceLock::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        *self.id.get_or_init(|| {
            let view = IdView {
                author: &self.author,
                timestamp: self.unix_time,
                nonce: self.nonce,
                action: &self.action,
            };
            // plain data into a Vec cannot fail to serialize
            let data = serde_json::to_vec(&view).unwrap_or_default();
            EntityId::from_object(ContentHasher::OPERATION.hash(&data))
        })
    }

    pub fn author(&self) -> EntityId {
        self.author
    }

    pub fn unix_time(&self) -> i64 {
        self.unix_time
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    pub fn is_create(&self) -> bool {
        self.action.is_create()
    }

    pub fn validate(&self) -> EntityResult<()> {
        if A::requires_author() && self.author.is_unset() {
            return Err(EntityError::validation("author not set"));
        }
        if self.unix_time <= 0 {
            return Err(EntityError::validation("time not set"));
        }
        self.action.validate()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Set a metadata value. Does not change the id.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }
}

impl<A: Action> PartialEq for Operation<A> {
    fn eq(&self, other: &Self) -> bool {
        self.author == other.author
            && self.unix_time == other.unix_time
            && self.nonce == other.nonce
            && self.action == other.action
            && self.metadata == other.metadata
    }
}

impl<A: Action> Eq for Operation<A> {}

// ---- text checks shared by the payload validators ----

pub(crate) fn is_single_line(text: &str) -> bool {
    !text.contains('\n') && !text.contains('\r')
}

/// Printable, allowing line breaks and tabs.
pub(crate) fn is_printable(text: &str) -> bool {
    text.chars()
        .all(|c| !c.is_control() || c == '\n' || c == '\r' || c == '\t')
}

pub(crate) fn validate_title(title: &str) -> EntityResult<()> {
    if title.trim().is_empty() {
        return Err(EntityError::validation("title is empty"));
    }
    if !is_single_line(title) {
        return Err(EntityError::validation("title should be a single line"));
    }
    if !is_printable(title) {
        return Err(EntityError::validation("title is not fully printable"));
    }
    Ok(())
}

pub(crate) fn validate_message(message: &str) -> EntityResult<()> {
    if !is_printable(message) {
        return Err(EntityError::validation("message is not fully printable"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bug::BugAction;

    fn author() -> EntityId {
        EntityId::from_hash([7; 32])
    }

    fn comment(message: &str) -> Operation<BugAction> {
        Operation::new(
            author(),
            1_700_000_000,
            BugAction::AddComment {
                message: message.into(),
                files: vec![],
            },
        )
    }

    #[test]
    fn id_ignores_metadata() {
        let mut op = comment("hello");
        let before = op.id();
        op.set_metadata("origin", "github");
        assert_eq!(op.id(), before);

        let json = serde_json::to_vec(&op).unwrap();
        let back: Operation<BugAction> = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.id(), before);
        assert_eq!(back.get_metadata("origin"), Some("github"));
        assert_eq!(back, op);
    }

    #[test]
    fn identical_edits_get_distinct_ids() {
        assert_ne!(comment("same").id(), comment("same").id());
    }

    #[test]
    fn serialized_form_is_flat() {
        let json = serde_json::to_value(comment("hi")).unwrap();
        assert_eq!(json["type"], "add_comment");
        assert_eq!(json["message"], "hi");
        assert_eq!(json["timestamp"], 1_700_000_000);
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn base_validation() {
        let op = Operation::new(
            EntityId::unset(),
            1,
            BugAction::SetTitle {
                title: "t".into(),
                was: String::new(),
            },
        );
        assert_eq!(op.validate().unwrap_err().to_string(), "author not set");

        let op = Operation::new(
            author(),
            0,
            BugAction::SetTitle {
                title: "t".into(),
                was: String::new(),
            },
        );
        assert_eq!(op.validate().unwrap_err().to_string(), "time not set");
    }

    #[test]
    fn text_checks() {
        assert!(validate_title("fine").is_ok());
        assert_eq!(validate_title("  ").unwrap_err().to_string(), "title is empty");
        assert_eq!(
            validate_title("a\nb").unwrap_err().to_string(),
            "title should be a single line"
        );
        assert_eq!(
            validate_title("bell\u{7}").unwrap_err().to_string(),
            "title is not fully printable"
        );
        assert!(validate_message("multi\nline\ttext").is_ok());
        assert!(validate_message("esc\u{1b}").is_err());
    }
}
