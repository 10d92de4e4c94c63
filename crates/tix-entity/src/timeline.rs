//! The rendered history of a ticket, one item per user-visible change.

use serde::{Deserialize, Serialize};
use tix_config::Label;
use tix_types::{EntityId, ObjectId};

use crate::ccb::CcbState;
use crate::status::Status;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEvent {
    Create {
        title: String,
        message: String,
    },
    Comment {
        /// Position in the snapshot's comment list.
        index: usize,
        message: String,
        files: Vec<ObjectId>,
    },
    CommentEdited {
        target: EntityId,
        message: String,
    },
    Title {
        title: String,
        was: String,
    },
    Status(Status),
    Labels {
        added: Vec<Label>,
        removed: Vec<Label>,
    },
    Assignee(EntityId),
    Ccb {
        user: EntityId,
        status: Status,
        state: CcbState,
    },
    Checklist(Label),
    Review {
        review: String,
        summary: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineItem {
    /// Id of the operation that produced the item.
    pub id: EntityId,
    pub author: EntityId,
    pub unix_time: i64,
    pub event: TimelineEvent,
}

impl TimelineItem {
    pub fn new(id: EntityId, author: EntityId, unix_time: i64, event: TimelineEvent) -> Self {
        Self {
            id,
            author,
            unix_time,
            event,
        }
    }

    /// The review this item belongs to, if any.
    pub fn review(&self) -> Option<&str> {
        match &self.event {
            TimelineEvent::Review { review, .. } => Some(review),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        match &self.event {
            TimelineEvent::Create { title, .. } => format!("created \"{title}\""),
            TimelineEvent::Comment { message, .. } => {
                let first = message.lines().next().unwrap_or_default();
                format!("commented: {first}")
            }
            TimelineEvent::CommentEdited { target, .. } => {
                format!("edited comment {}", target.human())
            }
            TimelineEvent::Title { title, was } => {
                format!("changed the title from \"{was}\" to \"{title}\"")
            }
            TimelineEvent::Status(status) => status.action().to_string(),
            TimelineEvent::Labels { added, removed } => {
                let join = |labels: &[Label]| {
                    labels.iter().map(Label::as_str).collect::<Vec<_>>().join(", ")
                };
                match (added.is_empty(), removed.is_empty()) {
                    (false, true) => format!("added label(s) {}", join(added)),
                    (true, false) => format!("removed label(s) {}", join(removed)),
                    _ => format!(
                        "added label(s) {} and removed label(s) {}",
                        join(added),
                        join(removed)
                    ),
                }
            }
            TimelineEvent::Assignee(user) => format!("assigned to {}", user.human()),
            TimelineEvent::Ccb {
                user,
                status,
                state,
            } => match state {
                CcbState::Added => format!("added {} as {status} approver", user.human()),
                CcbState::Removed => format!("removed {} as {status} approver", user.human()),
                CcbState::Approved => format!("approved {status}"),
                CcbState::Blocked => format!("blocked {status}"),
            },
            TimelineEvent::Checklist(label) => format!("updated checklist {label}"),
            TimelineEvent::Review { review, summary } => format!("review {review}: {summary}"),
        }
    }
}
