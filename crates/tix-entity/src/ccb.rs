use std::fmt;

use serde::{Deserialize, Serialize};
use tix_types::EntityId;

use crate::status::Status;

/// Where one approver stands on one target status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CcbState {
    /// Added to the ticket, no decision yet.
    Added,
    Approved,
    Blocked,
    Removed,
}

impl fmt::Display for CcbState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "Added",
            Self::Approved => "Approved",
            Self::Blocked => "Blocked",
            Self::Removed => "Removed",
        })
    }
}

/// An approver of a ticket's move into `status`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CcbInfo {
    pub user: EntityId,
    pub status: Status,
    pub state: CcbState,
}

impl CcbInfo {
    pub fn new(user: EntityId, status: Status, state: CcbState) -> Self {
        Self {
            user,
            status,
            state,
        }
    }
}
