//! Ticket queries evaluated against excerpts.
//!
//! Queries are built as values; there is no text syntax. Identity filters
//! (author, assignee, actor, participant, ccb) match a case-insensitive
//! fragment of the identity's name, email or login, or a prefix of its id.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tix_config::Label;
use tix_entity::{CcbState, Status};
use tix_types::EntityId;

use crate::excerpt::{BugExcerpt, IdentityExcerpt};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Any of the listed statuses.
    Status(Vec<Status>),
    Author(String),
    /// Never matches an unassigned ticket.
    Assignee(String),
    /// On the CCB for any status.
    Ccb(String),
    /// On the CCB for one of the next statuses and not yet approved.
    CcbPending(String),
    Actor(String),
    Participant(String),
    Label(Label),
    /// Case-insensitive substring of the title.
    Title(String),
    Not(Box<Filter>),
    CreatedBefore(i64),
    EditedBefore(i64),
    All(Vec<Filter>),
    Any(Vec<Filter>),
}

impl Filter {
    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    pub fn matches(
        &self,
        bug: &BugExcerpt,
        identities: &BTreeMap<EntityId, IdentityExcerpt>,
    ) -> bool {
        let who = |id: &EntityId, pattern: &String| identity_matches(identities, id, pattern);
        match self {
            Self::Status(statuses) => statuses.contains(&bug.status),
            Self::Author(p) => who(&bug.author, p),
            Self::Assignee(p) => bug.assignee.as_ref().is_some_and(|a| who(a, p)),
            Self::Ccb(p) => bug.ccb.iter().any(|c| who(&c.user, p)),
            Self::CcbPending(p) => bug.ccb.iter().any(|c| {
                c.state != CcbState::Approved
                    && bug.next_statuses.contains(&c.status)
                    && who(&c.user, p)
            }),
            Self::Actor(p) => bug.actors.iter().any(|a| who(a, p)),
            Self::Participant(p) => bug.participants.iter().any(|a| who(a, p)),
            Self::Label(label) => bug.has_label(label),
            Self::Title(p) => bug.title.to_lowercase().contains(&p.to_lowercase()),
            Self::Not(inner) => !inner.matches(bug, identities),
            Self::CreatedBefore(t) => bug.create_unix_time < *t,
            Self::EditedBefore(t) => bug.edit_unix_time < *t,
            Self::All(inner) => inner.iter().all(|f| f.matches(bug, identities)),
            Self::Any(inner) => inner.iter().any(|f| f.matches(bug, identities)),
        }
    }
}

fn identity_matches(
    identities: &BTreeMap<EntityId, IdentityExcerpt>,
    id: &EntityId,
    pattern: &str,
) -> bool {
    match identities.get(id) {
        Some(ident) => ident.matches(pattern),
        None => id.has_prefix(&pattern.to_lowercase()),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderBy {
    Id,
    Creation,
    #[default]
    Edit,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    #[default]
    Descending,
}

/// A filter plus an ordering. The default matches everything, most
/// recently edited first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub order_by: OrderBy,
    pub direction: Direction,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn order(mut self, order_by: OrderBy, direction: Direction) -> Self {
        self.order_by = order_by;
        self.direction = direction;
        self
    }

    /// Ids of the matching excerpts, ordered.
    pub fn run<'a>(
        &self,
        bugs: impl Iterator<Item = &'a BugExcerpt>,
        identities: &BTreeMap<EntityId, IdentityExcerpt>,
    ) -> Vec<EntityId> {
        let mut matched: Vec<&BugExcerpt> = bugs
            .filter(|b| self.filter.as_ref().map_or(true, |f| f.matches(b, identities)))
            .collect();
        matched.sort_by(|a, b| {
            let ord = self.compare(a, b);
            match self.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        });
        matched.into_iter().map(|b| b.id).collect()
    }

    fn compare(&self, a: &BugExcerpt, b: &BugExcerpt) -> Ordering {
        match self.order_by {
            OrderBy::Id => a.id.cmp(&b.id),
            OrderBy::Creation => (a.create_lamport, a.create_unix_time, a.id)
                .cmp(&(b.create_lamport, b.create_unix_time, b.id)),
            OrderBy::Edit => (a.edit_lamport, a.edit_unix_time, a.id)
                .cmp(&(b.edit_lamport, b.edit_unix_time, b.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tix_entity::CcbInfo;
    use tix_types::LamportTime;

    fn id(n: u8) -> EntityId {
        EntityId::from_hash([n; 32])
    }

    fn excerpt(n: u8, title: &str, status: Status, edit: u64) -> BugExcerpt {
        BugExcerpt {
            id: id(n),
            create_lamport: LamportTime(n as u64),
            edit_lamport: LamportTime(edit),
            create_unix_time: 1000 + n as i64,
            edit_unix_time: 2000 + edit as i64,
            status,
            author: id(100),
            assignee: None,
            labels: vec![],
            title: title.to_string(),
            len_comments: 1,
            actors: vec![id(100)],
            participants: vec![id(100)],
            ccb: vec![],
            next_statuses: vec![],
            create_metadata: BTreeMap::new(),
        }
    }

    fn people() -> BTreeMap<EntityId, IdentityExcerpt> {
        let ann = IdentityExcerpt {
            id: id(100),
            name: "Ann".into(),
            email: "ann@example.com".into(),
            login: "ann".into(),
        };
        let bob = IdentityExcerpt {
            id: id(101),
            name: "Bob".into(),
            email: String::new(),
            login: String::new(),
        };
        BTreeMap::from([(ann.id, ann), (bob.id, bob)])
    }

    fn bugs() -> Vec<BugExcerpt> {
        let mut assigned = excerpt(2, "Login crash", Status::InProgress, 7);
        assigned.assignee = Some(id(101));
        assigned.labels = vec![Label::new("repo:core"), Label::new("workflow:eng")];
        assigned.next_statuses = vec![Status::InReview];
        assigned.ccb = vec![
            CcbInfo::new(id(101), Status::InReview, CcbState::Added),
            CcbInfo::new(id(100), Status::Merged, CcbState::Added),
        ];
        vec![
            excerpt(1, "Crash on start", Status::Proposed, 3),
            assigned,
            excerpt(3, "Docs typo", Status::Done, 5),
        ]
    }

    fn run(query: Query) -> Vec<EntityId> {
        let bugs = bugs();
        query.run(bugs.iter(), &people())
    }

    #[test]
    fn default_is_everything_newest_edit_first() {
        assert_eq!(run(Query::default()), vec![id(2), id(3), id(1)]);
    }

    #[test]
    fn ordering() {
        assert_eq!(
            run(Query::default().order(OrderBy::Creation, Direction::Ascending)),
            vec![id(1), id(2), id(3)]
        );
        assert_eq!(
            run(Query::default().order(OrderBy::Id, Direction::Descending)),
            vec![id(3), id(2), id(1)]
        );
    }

    #[test]
    fn filters() {
        let only = |f: Filter| run(Query::new(f).order(OrderBy::Id, Direction::Ascending));

        assert_eq!(only(Filter::Status(vec![Status::Proposed, Status::Done])), vec![id(1), id(3)]);
        assert_eq!(only(Filter::Title("CRASH".into())), vec![id(1), id(2)]);
        assert_eq!(only(Filter::Author("ann".into())).len(), 3);
        assert_eq!(only(Filter::Assignee("bob".into())), vec![id(2)]);
        assert!(only(Filter::Assignee("ann".into())).is_empty());
        assert_eq!(only(Filter::Label(Label::new("repo:core"))), vec![id(2)]);
        assert_eq!(only(Filter::Ccb("ann".into())), vec![id(2)]);
        assert_eq!(only(Filter::CcbPending("bob".into())), vec![id(2)]);
        assert!(only(Filter::CcbPending("ann".into())).is_empty());
        assert_eq!(only(Filter::CreatedBefore(1002)), vec![id(1)]);
        assert_eq!(only(Filter::EditedBefore(2006)), vec![id(1), id(3)]);
        assert_eq!(only(Filter::Actor(id(100).human())).len(), 3);
        assert!(only(Filter::Participant("bob".into())).is_empty());
    }

    #[test]
    fn combinators() {
        let only = |f: Filter| run(Query::new(f).order(OrderBy::Id, Direction::Ascending));

        assert_eq!(
            only(Filter::not(Filter::Title("crash".into()))),
            vec![id(3)]
        );
        assert_eq!(
            only(Filter::All(vec![
                Filter::Title("crash".into()),
                Filter::Status(vec![Status::Proposed]),
            ])),
            vec![id(1)]
        );
        assert_eq!(
            only(Filter::Any(vec![
                Filter::Status(vec![Status::Done]),
                Filter::Assignee("bob".into()),
            ])),
            vec![id(2), id(3)]
        );
        assert_eq!(only(Filter::All(vec![])).len(), 3);
        assert!(only(Filter::Any(vec![])).is_empty());
    }
}
