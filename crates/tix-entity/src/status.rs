use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EntityError;

/// The closed set of ticket statuses.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Proposed,
    Vetted,
    InProgress,
    InReview,
    Reviewed,
    Accepted,
    Merged,
    Done,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::Proposed,
        Status::Vetted,
        Status::InProgress,
        Status::InReview,
        Status::Reviewed,
        Status::Accepted,
        Status::Merged,
        Status::Done,
        Status::Rejected,
    ];

    /// Statuses in which somebody is working on the ticket.
    pub const ACTIVE: [Status; 4] = [
        Status::InProgress,
        Status::InReview,
        Status::Reviewed,
        Status::Accepted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Vetted => "vetted",
            Self::InProgress => "inprogress",
            Self::InReview => "inreview",
            Self::Reviewed => "reviewed",
            Self::Accepted => "accepted",
            Self::Merged => "merged",
            Self::Done => "done",
            Self::Rejected => "rejected",
        }
    }

    /// Timeline wording of a change to this status.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Proposed => "set PROPOSED",
            Self::Vetted => "set VETTED",
            Self::InProgress => "set IN PROGRESS",
            Self::InReview => "set IN REVIEW",
            Self::Reviewed => "set REVIEWED",
            Self::Accepted => "set ACCEPTED",
            Self::Merged => "set MERGED",
            Self::Done => "set DONE",
            Self::Rejected => "set REJECTED",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == cleaned)
            .ok_or_else(|| EntityError::validation(format!("unknown status: {cleaned}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_trimmed_and_case_insensitive() {
        assert_eq!(" InProgress ".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("DONE".parse::<Status>().unwrap(), Status::Done);
        let err = "open".parse::<Status>().unwrap_err();
        assert_eq!(err.to_string(), "unknown status: open");
    }

    #[test]
    fn names_round_trip() {
        for status in Status::ALL {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn active_and_actions() {
        assert!(Status::InReview.is_active());
        assert!(!Status::Proposed.is_active());
        assert_eq!(Status::InProgress.action(), "set IN PROGRESS");
        assert_eq!(Status::default(), Status::Proposed);
    }
}
