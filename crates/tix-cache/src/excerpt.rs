//! Compact summaries of entities, kept in the index and used for queries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tix_config::Label;
use tix_entity::{Bug, CcbInfo, Identity, IdentitySnapshot, Snapshot, Status};
use tix_types::{EntityId, LamportTime};

/// What queries need to know about a ticket without replaying it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugExcerpt {
    pub id: EntityId,
    pub create_lamport: LamportTime,
    pub edit_lamport: LamportTime,
    pub create_unix_time: i64,
    pub edit_unix_time: i64,
    pub status: Status,
    pub author: EntityId,
    pub assignee: Option<EntityId>,
    pub labels: Vec<Label>,
    pub title: String,
    pub len_comments: usize,
    pub actors: Vec<EntityId>,
    pub participants: Vec<EntityId>,
    pub ccb: Vec<CcbInfo>,
    /// Empty when the ticket has no workflow.
    pub next_statuses: Vec<Status>,
    pub create_metadata: BTreeMap<String, String>,
}

impl BugExcerpt {
    pub fn new(bug: &Bug, snap: &Snapshot) -> Self {
        Self {
            id: bug.id(),
            create_lamport: bug.create_time(),
            edit_lamport: bug.edit_time(),
            create_unix_time: snap.create_time,
            edit_unix_time: snap.edit_time(),
            status: snap.status,
            author: snap.author,
            assignee: snap.assignee,
            labels: snap.labels.clone(),
            title: snap.title.clone(),
            len_comments: snap.comments.len(),
            actors: snap.actors.clone(),
            participants: snap.participants.clone(),
            ccb: snap.ccb.clone(),
            next_statuses: snap.next_statuses().unwrap_or_default(),
            create_metadata: snap
                .operations
                .first()
                .map(|op| op.metadata().clone())
                .unwrap_or_default(),
        }
    }

    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.binary_search(label).is_ok()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityExcerpt {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub login: String,
}

impl IdentityExcerpt {
    pub fn new(identity: &Identity) -> Self {
        Self::from_snapshot(&identity.snapshot())
    }

    pub fn from_snapshot(snap: &IdentitySnapshot) -> Self {
        Self {
            id: snap.id,
            name: snap.name.clone(),
            email: snap.email.clone(),
            login: snap.login.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        if self.email.is_empty() {
            self.name.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }

    /// Case-insensitive match of `query` against the name, email and login,
    /// or an id prefix.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.id.has_prefix(&query)
            || self.name.to_lowercase().contains(&query)
            || self.email.to_lowercase().contains(&query)
            || self.login.to_lowercase().contains(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tix_entity::edits;

    const T0: i64 = 1_700_000_000;

    #[test]
    fn bug_excerpt_follows_the_snapshot() {
        let ann = EntityId::from_hash([1; 32]);
        let mut bug = edits::create(ann, T0, "crash", "it crashes", vec![]).unwrap();
        edits::add_comment(&mut bug, ann, T0 + 5, "again", vec![]).unwrap();
        edits::force_change_labels(&mut bug, ann, T0 + 6, &[Label::new("workflow:eng")], &[])
            .unwrap();

        let excerpt = BugExcerpt::new(&bug, &bug.compile());
        assert_eq!(excerpt.id, bug.id());
        assert_eq!(excerpt.title, "crash");
        assert_eq!(excerpt.len_comments, 2);
        assert_eq!(excerpt.create_unix_time, T0);
        assert_eq!(excerpt.edit_unix_time, T0 + 6);
        assert!(excerpt.has_label(&Label::new("workflow:eng")));
        assert!(!excerpt.next_statuses.is_empty());
        assert_eq!(excerpt.actors, vec![ann]);
    }

    #[test]
    fn identity_matching() {
        let ident = Identity::create("Ann Smith", "ann@example.com", "asmith", T0).unwrap();
        let excerpt = IdentityExcerpt::new(&ident);
        assert!(excerpt.matches("ann"));
        assert!(excerpt.matches("SMITH"));
        assert!(excerpt.matches("example.com"));
        assert!(excerpt.matches(&ident.id().human()));
        assert!(!excerpt.matches("bob"));
        assert_eq!(excerpt.display_name(), "Ann Smith <ann@example.com>");
    }
}
