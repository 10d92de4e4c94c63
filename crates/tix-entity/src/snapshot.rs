//! The materialized state of a ticket, folded from its operations.
//!
//! A snapshot is never stored. It is recomputed from the operation log
//! whenever the log changes, and is the only state queries look at.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tix_config::{Checklist, ChecklistConfig, ChecklistState, Label};
use tix_types::EntityId;

use crate::bug::{Bug, BugAction, Comment};
use crate::ccb::{CcbInfo, CcbState};
use crate::error::{EntityError, EntityResult};
use crate::operation::Operation;
use crate::review::PullRequest;
use crate::status::Status;
use crate::timeline::{TimelineEvent, TimelineItem};
use crate::workflow::{workflow_for, Workflow};

/// One reviewer's copy of a checklist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistSnapshot {
    pub checklist: Checklist,
    pub last_edit: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub id: EntityId,
    pub status: Status,
    pub title: String,
    pub comments: Vec<Comment>,
    /// Kept sorted.
    pub labels: Vec<Label>,
    /// Checklist label to reviewer to that reviewer's answers.
    pub checklists: BTreeMap<Label, BTreeMap<EntityId, ChecklistSnapshot>>,
    pub reviews: BTreeMap<String, PullRequest>,
    pub author: EntityId,
    pub assignee: Option<EntityId>,
    /// Everybody who performed an operation.
    pub actors: Vec<EntityId>,
    /// Everybody who created the ticket or commented on it.
    pub participants: Vec<EntityId>,
    pub ccb: Vec<CcbInfo>,
    pub create_time: i64,
    pub timeline: Vec<TimelineItem>,
    pub operations: Vec<Operation<BugAction>>,
}

impl Bug {
    /// Fold every operation, committed and staged, into a snapshot.
    pub fn compile(&self) -> Snapshot {
        let mut snap = Snapshot {
            id: self.id(),
            ..Default::default()
        };
        for op in self.operations() {
            snap.apply(op);
            snap.operations.push(op.clone());
        }
        snap
    }
}

impl Snapshot {
    fn apply(&mut self, op: &Operation<BugAction>) {
        let id = op.id();
        let author = op.author();
        let time = op.unix_time();
        let item = |event| TimelineItem::new(id, author, time, event);

        match op.action() {
            BugAction::Create {
                title,
                message,
                files,
            } => {
                self.title = title.clone();
                self.comments = vec![Comment {
                    id,
                    author,
                    message: message.clone(),
                    files: files.clone(),
                    edited: false,
                    unix_time: time,
                }];
                self.author = author;
                self.create_time = time;
                self.add_participant(author);
                self.timeline.push(item(TimelineEvent::Create {
                    title: title.clone(),
                    message: message.clone(),
                }));
            }
            BugAction::SetTitle { title, was } => {
                self.title = title.clone();
                self.timeline.push(item(TimelineEvent::Title {
                    title: title.clone(),
                    was: was.clone(),
                }));
            }
            BugAction::SetStatus { status } => {
                self.status = *status;
                self.timeline.push(item(TimelineEvent::Status(*status)));
            }
            BugAction::AddComment { message, files } => {
                let index = self.comments.len();
                self.comments.push(Comment {
                    id,
                    author,
                    message: message.clone(),
                    files: files.clone(),
                    edited: false,
                    unix_time: time,
                });
                self.add_participant(author);
                self.timeline.push(item(TimelineEvent::Comment {
                    index,
                    message: message.clone(),
                    files: files.clone(),
                }));
            }
            BugAction::EditComment {
                target,
                message,
                files,
            } => {
                let Some(comment) = self.comments.iter_mut().find(|c| c.id == *target) else {
                    return;
                };
                comment.message = message.clone();
                comment.files = files.clone();
                comment.edited = true;
                self.timeline.push(item(TimelineEvent::CommentEdited {
                    target: *target,
                    message: message.clone(),
                }));
            }
            BugAction::LabelChange { added, removed } => {
                for label in added {
                    if !self.labels.contains(label) {
                        self.labels.push(label.clone());
                    }
                }
                self.labels.retain(|l| !removed.contains(l));
                self.labels.sort();
                self.timeline.push(item(TimelineEvent::Labels {
                    added: added.clone(),
                    removed: removed.clone(),
                }));
            }
            BugAction::SetAssignee { assignee } => {
                self.assignee = Some(*assignee);
                self.timeline.push(item(TimelineEvent::Assignee(*assignee)));
            }
            BugAction::SetCcb { ccb } => {
                let existing = self
                    .ccb
                    .iter()
                    .position(|c| c.user == ccb.user && c.status == ccb.status);
                match (ccb.state, existing) {
                    (CcbState::Added, None) => self.ccb.push(ccb.clone()),
                    (CcbState::Removed, Some(i)) => {
                        self.ccb.remove(i);
                    }
                    (CcbState::Approved | CcbState::Blocked, Some(i)) => {
                        self.ccb[i].state = ccb.state;
                    }
                    _ => return,
                }
                self.timeline.push(item(TimelineEvent::Ccb {
                    user: ccb.user,
                    status: ccb.status,
                    state: ccb.state,
                }));
            }
            BugAction::SetChecklist { checklist } => {
                self.checklists.entry(checklist.label.clone()).or_default().insert(
                    author,
                    ChecklistSnapshot {
                        checklist: checklist.clone(),
                        last_edit: time,
                    },
                );
                self.timeline
                    .push(item(TimelineEvent::Checklist(checklist.label.clone())));
            }
            BugAction::SetReview { review } => {
                let review_id = review.id().to_string();
                if review.is_remove() {
                    self.reviews.remove(&review_id);
                    self.timeline.retain(|t| t.review() != Some(review_id.as_str()));
                } else {
                    let added = match self.reviews.get_mut(&review_id) {
                        Some(existing) => existing.merge(review),
                        None => {
                            self.reviews.insert(review_id.clone(), review.clone());
                            review
                                .info()
                                .map(|i| i.transactions.clone())
                                .unwrap_or_default()
                        }
                    };
                    for tx in added {
                        self.timeline.push(TimelineItem::new(
                            id,
                            author,
                            tx.timestamp,
                            TimelineEvent::Review {
                                review: review_id.clone(),
                                summary: tx.summary(),
                            },
                        ));
                    }
                    self.timeline.sort_by_key(|t| t.unix_time);
                }
            }
            BugAction::SetMetadata {
                target,
                new_metadata,
            } => {
                if let Some(target) = self.operations.iter_mut().find(|o| o.id() == *target) {
                    for (key, value) in new_metadata {
                        if target.get_metadata(key).is_none() {
                            target.set_metadata(key.clone(), value.clone());
                        }
                    }
                }
                return;
            }
        }
        self.add_actor(author);
    }

    fn add_actor(&mut self, id: EntityId) {
        if !self.actors.contains(&id) {
            self.actors.push(id);
        }
    }

    fn add_participant(&mut self, id: EntityId) {
        if !self.participants.contains(&id) {
            self.participants.push(id);
        }
    }

    // ---- queries ----

    /// Unix time of the last operation.
    pub fn edit_time(&self) -> i64 {
        self.operations
            .last()
            .map(Operation::unix_time)
            .unwrap_or(self.create_time)
    }

    /// Metadata attached to the Create operation.
    pub fn create_metadata(&self, key: &str) -> Option<&str> {
        self.operations.first().and_then(|op| op.get_metadata(key))
    }

    pub fn search_comment(&self, id: EntityId) -> EntityResult<&Comment> {
        self.comments
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| EntityError::validation("comment item not found"))
    }

    pub fn has_actor(&self, id: &EntityId) -> bool {
        self.actors.contains(id)
    }

    pub fn has_participant(&self, id: &EntityId) -> bool {
        self.participants.contains(id)
    }

    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.binary_search(label).is_ok()
    }

    /// Where `user` stands on `status`; `Removed` if not on the board.
    pub fn get_ccb_state(&self, user: &EntityId, status: Status) -> CcbState {
        self.ccb
            .iter()
            .find(|c| &c.user == user && c.status == status)
            .map(|c| c.state)
            .unwrap_or(CcbState::Removed)
    }

    /// Whether `user` still has to approve one of the next statuses.
    pub fn is_ccb_pending(&self, user: &EntityId) -> bool {
        let Ok(next) = self.next_statuses() else {
            return false;
        };
        self.ccb
            .iter()
            .any(|c| &c.user == user && next.contains(&c.status) && c.state != CcbState::Approved)
    }

    pub fn workflow(&self) -> Option<&'static Workflow> {
        workflow_for(&self.labels)
    }

    fn require_workflow(&self) -> EntityResult<&'static Workflow> {
        self.workflow()
            .ok_or_else(|| EntityError::Transition("ticket has no associated workflow".into()))
    }

    pub fn next_statuses(&self) -> EntityResult<Vec<Status>> {
        Ok(self.require_workflow()?.next_statuses(self.status))
    }

    pub fn validate_transition(&self, next: Status) -> EntityResult<()> {
        self.require_workflow()?
            .validate_transition(self, self.status, next)
    }

    pub fn checklist_labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter().filter(|l| l.is_checklist())
    }

    /// The checklists `reviewer` filled in, one per checklist label on the
    /// ticket. With `blank`, labels without an answer get the empty template.
    pub fn get_user_checklists(
        &self,
        reviewer: &EntityId,
        blank: bool,
        config: &ChecklistConfig,
    ) -> EntityResult<BTreeMap<Label, Checklist>> {
        let mut out = BTreeMap::new();
        for label in self.checklist_labels() {
            let answered = self.checklists.get(label).and_then(|r| r.get(reviewer));
            match answered {
                Some(snap) => {
                    out.insert(label.clone(), snap.checklist.clone());
                }
                None if blank => {
                    out.insert(label.clone(), config.get(label)?.clone());
                }
                None => {}
            }
        }
        Ok(out)
    }

    /// Overall state of each checklist on the ticket across reviewers:
    /// Failed if anyone failed it, Passed if someone passed it, TBD otherwise.
    pub fn checklist_compound_states(&self) -> BTreeMap<Label, ChecklistState> {
        let mut states = BTreeMap::new();
        for label in self.checklist_labels() {
            let mut state = ChecklistState::Tbd;
            for reviewer in self.checklists.get(label).into_iter().flat_map(|r| r.values()) {
                match reviewer.checklist.compound_state() {
                    ChecklistState::Failed => {
                        state = ChecklistState::Failed;
                        break;
                    }
                    ChecklistState::Passed => state = ChecklistState::Passed,
                    _ => {}
                }
            }
            states.insert(label.clone(), state);
        }
        states
    }
}
