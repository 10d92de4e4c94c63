//! High-level ticket edits.
//!
//! Each helper builds one operation, validates it against the current state
//! and stages it on the bug. Nothing is committed here.

use std::collections::BTreeMap;
use std::fmt;

use tix_config::{Checklist, ConfigCache, Label};
use tix_types::{EntityId, ObjectId};

use crate::bug::{Bug, BugAction};
use crate::ccb::{CcbInfo, CcbState};
use crate::error::{EntityError, EntityResult};
use crate::operation::Operation;
use crate::review::PullRequest;
use crate::status::Status;
use crate::workflow::{find_workflow, Workflow};

fn stage(bug: &mut Bug, author: EntityId, unix_time: i64, action: BugAction) -> EntityResult<EntityId> {
    let op = Operation::new(author, unix_time, action);
    op.validate()?;
    let id = op.id();
    bug.append(op);
    Ok(id)
}

pub fn create(
    author: EntityId,
    unix_time: i64,
    title: &str,
    message: &str,
    files: Vec<ObjectId>,
) -> EntityResult<Bug> {
    let mut bug = Bug::new();
    stage(
        &mut bug,
        author,
        unix_time,
        BugAction::Create {
            title: title.to_string(),
            message: message.to_string(),
            files,
        },
    )?;
    Ok(bug)
}

pub fn add_comment(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    message: &str,
    files: Vec<ObjectId>,
) -> EntityResult<EntityId> {
    stage(
        bug,
        author,
        unix_time,
        BugAction::AddComment {
            message: message.to_string(),
            files,
        },
    )
}

pub fn edit_comment(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    target: EntityId,
    message: &str,
    files: Vec<ObjectId>,
) -> EntityResult<EntityId> {
    bug.compile().search_comment(target)?;
    stage(
        bug,
        author,
        unix_time,
        BugAction::EditComment {
            target,
            message: message.to_string(),
            files,
        },
    )
}

/// Edit the description, i.e. the comment of the Create operation.
pub fn edit_create_comment(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    message: &str,
    files: Vec<ObjectId>,
) -> EntityResult<EntityId> {
    let target = bug.id();
    edit_comment(bug, author, unix_time, target, message, files)
}

pub fn set_title(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    title: &str,
) -> EntityResult<EntityId> {
    let was = bug.compile().title;
    stage(
        bug,
        author,
        unix_time,
        BugAction::SetTitle {
            title: title.to_string(),
            was,
        },
    )
}

/// Change the status if the ticket's workflow allows it.
pub fn set_status(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    status: Status,
) -> EntityResult<EntityId> {
    bug.compile().validate_transition(status)?;
    force_set_status(bug, author, unix_time, status)
}

/// Change the status without consulting the workflow.
pub fn force_set_status(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    status: Status,
) -> EntityResult<EntityId> {
    stage(bug, author, unix_time, BugAction::SetStatus { status })
}

pub fn set_assignee(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    assignee: EntityId,
) -> EntityResult<EntityId> {
    stage(bug, author, unix_time, BugAction::SetAssignee { assignee })
}

// ---- CCB ----

fn set_ccb(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    ccb: CcbInfo,
) -> EntityResult<EntityId> {
    stage(bug, author, unix_time, BugAction::SetCcb { ccb })
}

/// Put `user` on the board approving `status`.
pub fn ccb_add(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    user: EntityId,
    status: Status,
    config: &ConfigCache,
) -> EntityResult<EntityId> {
    if !config.ccb.is_member(&user) {
        return Err(EntityError::validation(format!(
            "{} is not a CCB member",
            user.human()
        )));
    }
    if bug.compile().get_ccb_state(&user, status) != CcbState::Removed {
        return Err(EntityError::validation(format!(
            "{} is already in the CCB group for status {status}",
            user.human()
        )));
    }
    set_ccb(bug, author, unix_time, CcbInfo::new(user, status, CcbState::Added))
}

pub fn ccb_rm(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    user: EntityId,
    status: Status,
) -> EntityResult<EntityId> {
    require_on_board(bug, &user, status)?;
    set_ccb(bug, author, unix_time, CcbInfo::new(user, status, CcbState::Removed))
}

/// Approve `status` as `author`, who must be on its board.
pub fn ccb_approve(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    status: Status,
) -> EntityResult<EntityId> {
    require_on_board(bug, &author, status)?;
    set_ccb(bug, author, unix_time, CcbInfo::new(author, status, CcbState::Approved))
}

pub fn ccb_block(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    status: Status,
) -> EntityResult<EntityId> {
    require_on_board(bug, &author, status)?;
    set_ccb(bug, author, unix_time, CcbInfo::new(author, status, CcbState::Blocked))
}

fn require_on_board(bug: &Bug, user: &EntityId, status: Status) -> EntityResult<()> {
    if bug.compile().get_ccb_state(user, status) == CcbState::Removed {
        return Err(EntityError::validation(format!(
            "{} is not in the CCB group for status {status}",
            user.human()
        )));
    }
    Ok(())
}

// ---- checklists, reviews, metadata ----

pub fn set_checklist(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    checklist: Checklist,
) -> EntityResult<EntityId> {
    stage(bug, author, unix_time, BugAction::SetChecklist { checklist })
}

pub fn set_review(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    review: PullRequest,
) -> EntityResult<EntityId> {
    stage(bug, author, unix_time, BugAction::SetReview { review })
}

pub fn set_metadata(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    target: EntityId,
    new_metadata: BTreeMap<String, String>,
) -> EntityResult<EntityId> {
    stage(
        bug,
        author,
        unix_time,
        BugAction::SetMetadata {
            target,
            new_metadata,
        },
    )
}

// ---- labels ----

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelChangeStatus {
    Added,
    Removed,
    DuplicateInOp,
    AlreadySet,
    DoesntExist,
    InvalidWorkflow,
    InvalidChecklist,
    UnknownLabel,
    DeprecatedLabel(String),
    UnauthorizedChecklistChange,
}

/// What happened to one label of a label edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelChangeResult {
    pub label: Label,
    pub status: LabelChangeStatus,
}

impl LabelChangeResult {
    fn new(label: &Label, status: LabelChangeStatus) -> Self {
        Self {
            label: label.clone(),
            status,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.status, LabelChangeStatus::Added | LabelChangeStatus::Removed)
    }
}

impl fmt::Display for LabelChangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = &self.label;
        match &self.status {
            LabelChangeStatus::Added => write!(f, "label {label} added"),
            LabelChangeStatus::Removed => write!(f, "label {label} removed"),
            LabelChangeStatus::DuplicateInOp => write!(f, "label {label} is a duplicate"),
            LabelChangeStatus::AlreadySet => write!(f, "label {label} was already set"),
            LabelChangeStatus::DoesntExist => {
                write!(f, "label {label} doesn't exist on this ticket")
            }
            LabelChangeStatus::InvalidWorkflow => write!(f, "label {label} is an invalid workflow"),
            LabelChangeStatus::InvalidChecklist => {
                write!(f, "label {label} is an invalid checklist")
            }
            LabelChangeStatus::UnknownLabel => write!(f, "label {label} is not configured"),
            LabelChangeStatus::DeprecatedLabel(message) => {
                write!(f, "label {label} is deprecated: {message}")
            }
            LabelChangeStatus::UnauthorizedChecklistChange => write!(
                f,
                "label {label} can only be removed by a CCB member once the ticket is past proposed"
            ),
        }
    }
}

/// Add and remove labels, checking each against the configuration.
///
/// Adding a workflow label replaces the current one and resets the status
/// to the new workflow's initial status. Fails with
/// [`EntityError::NoLabelChange`] when no label ends up added or removed.
pub fn change_labels(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    add: &[Label],
    remove: &[Label],
    allow_deprecated: bool,
    config: &ConfigCache,
) -> EntityResult<Vec<LabelChangeResult>> {
    let snap = bug.compile();
    let mut results = Vec::new();
    let mut added: Vec<Label> = Vec::new();
    let mut removed: Vec<Label> = Vec::new();
    let mut new_workflow: Option<&'static Workflow> = None;
    let mut to_remove: Vec<Label> = remove.to_vec();

    for label in add {
        if added.contains(label) {
            results.push(LabelChangeResult::new(label, LabelChangeStatus::DuplicateInOp));
            continue;
        }
        if snap.has_label(label) {
            results.push(LabelChangeResult::new(label, LabelChangeStatus::AlreadySet));
            continue;
        }
        let rejected = if label.is_workflow() {
            match find_workflow(label) {
                Some(workflow) if new_workflow.is_none() => {
                    new_workflow = Some(workflow);
                    for current in snap.labels.iter().filter(|l| l.is_workflow()) {
                        if !to_remove.contains(current) {
                            to_remove.push(current.clone());
                        }
                    }
                    None
                }
                _ => Some(LabelChangeStatus::InvalidWorkflow),
            }
        } else if label.is_checklist() {
            match config.checklists.get(label) {
                Err(_) => Some(LabelChangeStatus::InvalidChecklist),
                Ok(c) if c.is_deprecated() && !allow_deprecated => {
                    Some(LabelChangeStatus::DeprecatedLabel(c.deprecated.clone()))
                }
                Ok(_) => None,
            }
        } else {
            match config.labels.get(label) {
                Err(_) => Some(LabelChangeStatus::UnknownLabel),
                Ok(rule) if rule.is_deprecated() && !allow_deprecated => Some(
                    LabelChangeStatus::DeprecatedLabel(rule.deprecation_message.clone()),
                ),
                Ok(_) => None,
            }
        };
        match rejected {
            Some(status) => results.push(LabelChangeResult::new(label, status)),
            None => {
                added.push(label.clone());
                results.push(LabelChangeResult::new(label, LabelChangeStatus::Added));
            }
        }
    }

    let ccb_member = config.ccb.is_member(&author);
    for label in &to_remove {
        let status = if removed.contains(label) {
            LabelChangeStatus::DuplicateInOp
        } else if !snap.has_label(label) {
            LabelChangeStatus::DoesntExist
        } else if label.is_workflow() && new_workflow.is_none() {
            LabelChangeStatus::InvalidWorkflow
        } else if label.is_checklist() && !ccb_member && snap.status != Status::Proposed {
            LabelChangeStatus::UnauthorizedChecklistChange
        } else {
            removed.push(label.clone());
            LabelChangeStatus::Removed
        };
        results.push(LabelChangeResult::new(label, status));
    }

    if added.is_empty() && removed.is_empty() {
        return Err(EntityError::NoLabelChange(results));
    }
    stage(bug, author, unix_time, BugAction::LabelChange { added, removed })?;
    if let Some(workflow) = new_workflow {
        force_set_status(bug, author, unix_time, workflow.initial)?;
    }
    Ok(results)
}

/// Add and remove labels with no checks beyond payload validation.
pub fn force_change_labels(
    bug: &mut Bug,
    author: EntityId,
    unix_time: i64,
    add: &[Label],
    remove: &[Label],
) -> EntityResult<EntityId> {
    stage(
        bug,
        author,
        unix_time,
        BugAction::LabelChange {
            added: add.to_vec(),
            removed: remove.to_vec(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tix_config::{CcbConfig, ChecklistConfig, LabelConfig};

    const T0: i64 = 1_700_000_000;

    fn ann() -> EntityId {
        EntityId::from_hash([1; 32])
    }

    fn bob() -> EntityId {
        EntityId::from_hash([2; 32])
    }

    fn config() -> ConfigCache {
        let labels = LabelConfig::parse(
            br#"{"labels": [
                "bug",
                {"name": "legacy", "deprecationMessage": "use bug"},
                {"prefix": "repo", "labels": ["core", "web"]}
            ]}"#,
        )
        .unwrap();
        let mut checklists = ChecklistConfig::default();
        for (label, deprecated) in [("checklist:sw", ""), ("checklist:old", "gone")] {
            checklists.insert(Checklist {
                label: label.into(),
                title: label.into(),
                deprecated: deprecated.into(),
                sections: vec![],
            });
        }
        ConfigCache {
            labels,
            checklists,
            ccb: CcbConfig { members: vec![ann()] },
        }
    }

    fn bug() -> Bug {
        create(ann(), T0, "crash", "it crashes", vec![]).unwrap()
    }

    fn labels(bug: &Bug) -> Vec<String> {
        bug.compile().labels.iter().map(|l| l.to_string()).collect()
    }

    fn statuses(results: &[LabelChangeResult]) -> Vec<LabelChangeStatus> {
        results.iter().map(|r| r.status.clone()).collect()
    }

    fn change(bug: &mut Bug, author: EntityId, add: &[&str], remove: &[&str]) -> EntityResult<Vec<LabelChangeResult>> {
        let add: Vec<Label> = add.iter().map(|s| Label::from(*s)).collect();
        let remove: Vec<Label> = remove.iter().map(|s| Label::from(*s)).collect();
        change_labels(bug, author, T0 + 1, &add, &remove, false, &config())
    }

    // ---- simple edits ----

    #[test]
    fn create_validates() {
        assert!(create(ann(), T0, "", "x", vec![]).is_err());
        let bug = bug();
        assert_eq!(bug.op_count(), 1);
        assert!(bug.need_commit());
    }

    #[test]
    fn title_records_previous_value() {
        let mut bug = bug();
        set_title(&mut bug, ann(), T0 + 1, "crash on start").unwrap();
        let snap = bug.compile();
        assert_eq!(snap.title, "crash on start");
        match snap.operations[1].action() {
            BugAction::SetTitle { was, .. } => assert_eq!(was, "crash"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn edit_unknown_comment_fails() {
        let mut bug = bug();
        assert!(edit_comment(&mut bug, ann(), T0 + 1, EntityId::from_hash([9; 32]), "x", vec![]).is_err());
        edit_create_comment(&mut bug, ann(), T0 + 1, "better description", vec![]).unwrap();
        assert_eq!(bug.compile().comments[0].message, "better description");
    }

    #[test]
    fn status_goes_through_the_workflow() {
        let mut bug = bug();
        let err = set_status(&mut bug, ann(), T0 + 1, Status::Vetted).unwrap_err();
        assert_eq!(err.to_string(), "ticket has no associated workflow");
        force_set_status(&mut bug, ann(), T0 + 1, Status::Done).unwrap();
        assert_eq!(bug.compile().status, Status::Done);
    }

    // ---- ccb ----

    #[test]
    fn ccb_lifecycle() {
        let mut bug = bug();
        let config = config();
        let err = ccb_add(&mut bug, ann(), T0 + 1, bob(), Status::Vetted, &config).unwrap_err();
        assert!(err.to_string().contains("is not a CCB member"));

        ccb_add(&mut bug, ann(), T0 + 1, ann(), Status::Vetted, &config).unwrap();
        assert!(ccb_add(&mut bug, ann(), T0 + 2, ann(), Status::Vetted, &config).is_err());
        assert!(ccb_approve(&mut bug, bob(), T0 + 2, Status::Vetted).is_err());
        ccb_approve(&mut bug, ann(), T0 + 2, Status::Vetted).unwrap();
        assert_eq!(
            bug.compile().get_ccb_state(&ann(), Status::Vetted),
            CcbState::Approved
        );
        ccb_block(&mut bug, ann(), T0 + 3, Status::Vetted).unwrap();
        ccb_rm(&mut bug, ann(), T0 + 4, ann(), Status::Vetted).unwrap();
        assert!(bug.compile().ccb.is_empty());
        assert!(ccb_rm(&mut bug, ann(), T0 + 5, ann(), Status::Vetted).is_err());
    }

    #[test]
    fn eng_workflow_end_to_end() {
        let mut bug = bug();
        let config = config();
        change(&mut bug, ann(), &["workflow:eng"], &[]).unwrap();
        ccb_add(&mut bug, ann(), T0 + 2, ann(), Status::Vetted, &config).unwrap();
        let snap = bug.compile();
        assert!(snap.is_ccb_pending(&ann()));
        assert_eq!(
            set_status(&mut bug, ann(), T0 + 3, Status::Vetted).unwrap_err().to_string(),
            "not all CCB have approved ticket status vetted"
        );
        ccb_approve(&mut bug, ann(), T0 + 3, Status::Vetted).unwrap();
        set_status(&mut bug, ann(), T0 + 4, Status::Vetted).unwrap();
        set_assignee(&mut bug, ann(), T0 + 5, bob()).unwrap();
        set_status(&mut bug, ann(), T0 + 6, Status::InProgress).unwrap();
        let snap = bug.compile();
        assert_eq!(snap.status, Status::InProgress);
        assert_eq!(snap.next_statuses().unwrap(), vec![Status::InReview]);
    }

    // ---- labels ----

    #[test]
    fn add_and_remove_labels() {
        let mut bug = bug();
        let results = change(&mut bug, ann(), &["bug", "bug", "nope", "legacy"], &[]).unwrap();
        assert_eq!(
            statuses(&results),
            vec![
                LabelChangeStatus::Added,
                LabelChangeStatus::DuplicateInOp,
                LabelChangeStatus::UnknownLabel,
                LabelChangeStatus::DeprecatedLabel("use bug".into()),
            ]
        );
        assert_eq!(results[0].to_string(), "label bug added");

        let results = change(&mut bug, ann(), &["bug", "repo:core"], &["bug", "repo:web"]).unwrap();
        assert_eq!(
            statuses(&results),
            vec![
                LabelChangeStatus::AlreadySet,
                LabelChangeStatus::Added,
                LabelChangeStatus::Removed,
                LabelChangeStatus::DoesntExist,
            ]
        );
        assert_eq!(labels(&bug), vec!["repo:core"]);
    }

    #[test]
    fn nothing_changed_is_an_error() {
        let mut bug = bug();
        let err = change(&mut bug, ann(), &["nope"], &["bug"]).unwrap_err();
        assert_eq!(err.to_string(), "no label added or removed");
        match err {
            EntityError::NoLabelChange(results) => assert_eq!(results.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(bug.op_count(), 1);
    }

    #[test]
    fn workflow_labels_replace_each_other() {
        let mut bug = bug();
        change(&mut bug, ann(), &["workflow:eng"], &[]).unwrap();
        force_set_status(&mut bug, ann(), T0 + 2, Status::Vetted).unwrap();

        let results = change(&mut bug, ann(), &["workflow:qa"], &[]).unwrap();
        assert_eq!(
            statuses(&results),
            vec![LabelChangeStatus::Added, LabelChangeStatus::Removed]
        );
        let snap = bug.compile();
        assert_eq!(labels(&bug), vec!["workflow:qa"]);
        assert_eq!(snap.status, Status::Proposed);

        let err = change(&mut bug, ann(), &["workflow:nope"], &["workflow:qa"]).unwrap_err();
        match err {
            EntityError::NoLabelChange(results) => assert_eq!(
                statuses(&results),
                vec![LabelChangeStatus::InvalidWorkflow, LabelChangeStatus::InvalidWorkflow]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn checklist_labels() {
        let mut bug = bug();
        let results = change(&mut bug, ann(), &["checklist:sw", "checklist:old", "checklist:x"], &[]).unwrap();
        assert_eq!(
            statuses(&results),
            vec![
                LabelChangeStatus::Added,
                LabelChangeStatus::DeprecatedLabel("gone".into()),
                LabelChangeStatus::InvalidChecklist,
            ]
        );

        // past Proposed only CCB members may drop a checklist
        force_set_status(&mut bug, ann(), T0 + 2, Status::Vetted).unwrap();
        let err = change(&mut bug, bob(), &[], &["checklist:sw"]).unwrap_err();
        match err {
            EntityError::NoLabelChange(results) => assert_eq!(
                statuses(&results),
                vec![LabelChangeStatus::UnauthorizedChecklistChange]
            ),
            other => panic!("unexpected {other:?}"),
        }
        change(&mut bug, ann(), &[], &["checklist:sw"]).unwrap();
        assert!(labels(&bug).is_empty());
    }

    #[test]
    fn deprecated_labels_can_be_forced() {
        let mut bug = bug();
        let results = change_labels(
            &mut bug,
            ann(),
            T0 + 1,
            &["legacy".into()],
            &[],
            true,
            &config(),
        )
        .unwrap();
        assert!(results[0].is_applied());
        force_change_labels(&mut bug, ann(), T0 + 2, &["anything".into()], &[]).unwrap();
        assert_eq!(labels(&bug), vec!["anything", "legacy"]);
    }
}
