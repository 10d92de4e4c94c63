//! Ticket workflows: per-label status machines with approval hooks.
//!
//! Workflows are fixed at build time and selected by the `workflow:` label
//! on a ticket. A transition runs its hooks in order and stops at the first
//! one that fails.

use std::sync::LazyLock;

use tix_config::{ChecklistState, Label};

use crate::ccb::CcbState;
use crate::error::{EntityError, EntityResult};
use crate::snapshot::Snapshot;
use crate::status::Status;

/// A precondition on a status change.
pub trait TransitionHook: Send + Sync {
    fn check(&self, snap: &Snapshot, next: Status) -> Result<(), String>;
}

/// The ticket must have an assignee.
pub struct AssigneeSet;

impl TransitionHook for AssigneeSet {
    fn check(&self, snap: &Snapshot, _next: Status) -> Result<(), String> {
        match snap.assignee {
            Some(_) => Ok(()),
            None => Err("assignee not set".into()),
        }
    }
}

/// Every CCB entry for the target status must be approved, and there must be
/// at least one.
pub struct CcbApproved;

impl TransitionHook for CcbApproved {
    fn check(&self, snap: &Snapshot, next: Status) -> Result<(), String> {
        let mut entries = snap.ccb.iter().filter(|c| c.status == next).peekable();
        if entries.peek().is_none() {
            return Err(format!("no CCB assigned to ticket status {next}"));
        }
        if entries.any(|c| c.state != CcbState::Approved) {
            return Err(format!("not all CCB have approved ticket status {next}"));
        }
        Ok(())
    }
}

/// No checklist on the ticket may still be TBD.
pub struct ChecklistsCompleted;

impl TransitionHook for ChecklistsCompleted {
    fn check(&self, snap: &Snapshot, _next: Status) -> Result<(), String> {
        if snap
            .checklist_compound_states()
            .values()
            .any(|s| *s == ChecklistState::Tbd)
        {
            return Err("at least one checklist still TBD".into());
        }
        Ok(())
    }
}

pub struct Transition {
    pub start: Status,
    pub end: Status,
    pub hooks: Vec<&'static dyn TransitionHook>,
}

pub struct Workflow {
    pub label: Label,
    pub initial: Status,
    pub transitions: Vec<Transition>,
}

impl Workflow {
    pub fn next_statuses(&self, current: Status) -> Vec<Status> {
        self.transitions
            .iter()
            .filter(|t| t.start == current)
            .map(|t| t.end)
            .collect()
    }

    pub fn validate_transition(&self, snap: &Snapshot, from: Status, to: Status) -> EntityResult<()> {
        let transition = self
            .transitions
            .iter()
            .find(|t| t.start == from && t.end == to)
            .ok_or_else(|| {
                let next: Vec<_> = self.next_statuses(from).iter().map(Status::as_str).collect();
                EntityError::Transition(format!(
                    "invalid transition {from}->{to}, possible next statuses: [{}]",
                    next.join(" ")
                ))
            })?;
        for hook in &transition.hooks {
            hook.check(snap, to).map_err(EntityError::Transition)?;
        }
        Ok(())
    }
}

fn transition(start: Status, end: Status, hooks: &[&'static dyn TransitionHook]) -> Transition {
    Transition {
        start,
        end,
        hooks: hooks.to_vec(),
    }
}

static WORKFLOWS: LazyLock<Vec<Workflow>> = LazyLock::new(|| {
    use Status::*;
    let assignee: &'static dyn TransitionHook = &AssigneeSet;
    let ccb: &'static dyn TransitionHook = &CcbApproved;
    let checklists: &'static dyn TransitionHook = &ChecklistsCompleted;
    vec![
        Workflow {
            label: Label::new("workflow:eng"),
            initial: Proposed,
            transitions: vec![
                transition(Proposed, Vetted, &[ccb]),
                transition(Vetted, Proposed, &[]),
                transition(Vetted, InProgress, &[assignee]),
                transition(InProgress, InReview, &[]),
                transition(InReview, InProgress, &[]),
                transition(InReview, Reviewed, &[checklists]),
                transition(Reviewed, Accepted, &[ccb]),
                transition(Accepted, Merged, &[]),
            ],
        },
        Workflow {
            label: Label::new("workflow:qa"),
            initial: Proposed,
            transitions: vec![
                transition(Proposed, InProgress, &[assignee]),
                transition(InProgress, Done, &[checklists]),
            ],
        },
        Workflow {
            label: Label::new("workflow:change"),
            initial: Proposed,
            transitions: vec![
                transition(Proposed, Vetted, &[ccb]),
                transition(Vetted, InProgress, &[assignee]),
                transition(InProgress, Done, &[ccb, checklists]),
                transition(Vetted, Rejected, &[]),
            ],
        },
    ]
});

/// The workflow registered under `label`.
pub fn find_workflow(label: &Label) -> Option<&'static Workflow> {
    WORKFLOWS.iter().find(|w| &w.label == label)
}

/// The workflow selected by the first workflow label in `labels`.
pub fn workflow_for(labels: &[Label]) -> Option<&'static Workflow> {
    labels.iter().find_map(find_workflow)
}

pub fn workflow_labels() -> Vec<Label> {
    WORKFLOWS.iter().map(|w| w.label.clone()).collect()
}
