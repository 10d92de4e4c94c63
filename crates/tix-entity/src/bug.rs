//! Ticket operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tix_config::{Checklist, Label};
use tix_repo::Namespace;
use tix_types::{EntityId, ObjectId};

use crate::ccb::CcbInfo;
use crate::entity::Entity;
use crate::error::{EntityError, EntityResult};
use crate::operation::{validate_message, validate_title, Action};
use crate::review::PullRequest;
use crate::status::Status;

/// A ticket.
pub type Bug = Entity<BugAction>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BugAction {
    Create {
        title: String,
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<ObjectId>,
    },
    SetTitle {
        title: String,
        was: String,
    },
    SetStatus {
        status: Status,
    },
    AddComment {
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<ObjectId>,
    },
    EditComment {
        /// Id of the operation that created the comment.
        target: EntityId,
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        files: Vec<ObjectId>,
    },
    LabelChange {
        #[serde(default)]
        added: Vec<Label>,
        #[serde(default)]
        removed: Vec<Label>,
    },
    SetAssignee {
        assignee: EntityId,
    },
    SetCcb {
        ccb: CcbInfo,
    },
    SetChecklist {
        checklist: Checklist,
    },
    SetReview {
        review: PullRequest,
    },
    /// Attach metadata to an earlier operation, never overriding a key.
    SetMetadata {
        target: EntityId,
        new_metadata: BTreeMap<String, String>,
    },
}

impl Action for BugAction {
    const NAMESPACE: Namespace = Namespace::BUGS;
    const TYPENAME: &'static str = "bug";

    fn is_create(&self) -> bool {
        matches!(self, Self::Create { .. })
    }

    fn validate(&self) -> EntityResult<()> {
        match self {
            Self::Create { title, message, .. } => {
                validate_title(title)?;
                validate_message(message)
            }
            Self::SetTitle { title, .. } => validate_title(title),
            Self::SetStatus { .. } => Ok(()),
            Self::AddComment { message, .. } => validate_message(message),
            Self::EditComment {
                target, message, ..
            } => {
                if target.is_unset() {
                    return Err(EntityError::validation("target hash is invalid"));
                }
                validate_message(message)
            }
            Self::LabelChange { added, removed } => {
                if added.is_empty() && removed.is_empty() {
                    return Err(EntityError::validation("no label change"));
                }
                for label in added.iter().chain(removed) {
                    label.validate()?;
                }
                Ok(())
            }
            Self::SetAssignee { assignee } => {
                if assignee.is_unset() {
                    return Err(EntityError::validation("assignee is not set"));
                }
                Ok(())
            }
            Self::SetCcb { ccb } => {
                if ccb.user.is_unset() {
                    return Err(EntityError::validation("ccb user is not set"));
                }
                Ok(())
            }
            Self::SetChecklist { checklist } => {
                if !checklist.label.is_checklist() {
                    return Err(EntityError::validation(format!(
                        "{} is not a checklist label",
                        checklist.label
                    )));
                }
                Ok(())
            }
            Self::SetReview { review } => {
                if review.id().trim().is_empty() {
                    return Err(EntityError::validation("review id is empty"));
                }
                Ok(())
            }
            Self::SetMetadata { target, .. } => {
                if target.is_unset() {
                    return Err(EntityError::validation("target hash is invalid"));
                }
                Ok(())
            }
        }
    }
}

/// A comment as it appears in a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Id of the operation that created the comment.
    pub id: EntityId,
    pub author: EntityId,
    pub message: String,
    pub files: Vec<ObjectId>,
    pub edited: bool,
    pub unix_time: i64,
}
