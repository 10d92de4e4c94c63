//! Code reviews attached to a ticket.
//!
//! The set of review providers is fixed, so a review is a closed enum. A
//! `Remove` value detaches the review with the same id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One event in a review's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Provider-assigned id, unique within the review.
    pub id: String,
    /// Provider user name.
    pub user: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: TransactionKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionKind {
    Comment {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
    /// The overall review status changed.
    Status { status: String },
    /// One reviewer's verdict changed.
    UserStatus { status: String },
    /// A new diff was uploaded.
    Diff { diff: u64 },
}

impl Transaction {
    /// One-line description used in the ticket timeline.
    pub fn summary(&self) -> String {
        match &self.kind {
            TransactionKind::Comment { text, path, line } => match (path, line) {
                (Some(path), Some(line)) => format!("{} commented on {path}:{line}: {text}", self.user),
                _ => format!("{} commented: {text}", self.user),
            },
            TransactionKind::Status { status } => format!("status set to {status}"),
            TransactionKind::UserStatus { status } => format!("{} set {status}", self.user),
            TransactionKind::Diff { diff } => format!("{} uploaded diff {diff}", self.user),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum PullRequest {
    Phabricator(ReviewInfo),
    Gitea(ReviewInfo),
    Remove { id: String },
}

impl PullRequest {
    pub fn id(&self) -> &str {
        match self {
            Self::Phabricator(info) | Self::Gitea(info) => &info.id,
            Self::Remove { id } => id,
        }
    }

    pub fn info(&self) -> Option<&ReviewInfo> {
        match self {
            Self::Phabricator(info) | Self::Gitea(info) => Some(info),
            Self::Remove { .. } => None,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }

    /// Fold `other` into `self`: adopt a non-empty title and append the
    /// transactions not seen yet. Returns the newly added transactions.
    pub fn merge(&mut self, other: &PullRequest) -> Vec<Transaction> {
        let (Self::Phabricator(mine) | Self::Gitea(mine)) = self else {
            return Vec::new();
        };
        let Some(theirs) = other.info() else {
            return Vec::new();
        };
        if !theirs.title.is_empty() {
            mine.title = theirs.title.clone();
        }
        let mut added = Vec::new();
        for tx in &theirs.transactions {
            if !mine.transactions.iter().any(|t| t.id == tx.id) {
                mine.transactions.push(tx.clone());
                added.push(tx.clone());
            }
        }
        added
    }

    /// Status of the newest `Status` transaction, `"REMOVED"` for a removal.
    pub fn latest_overall_status(&self) -> String {
        let Some(info) = self.info() else {
            return "REMOVED".to_string();
        };
        info.transactions
            .iter()
            .filter_map(|t| match &t.kind {
                TransactionKind::Status { status } => Some((t.timestamp, status)),
                _ => None,
            })
            .max_by_key(|(ts, _)| *ts)
            .map(|(_, status)| status.clone())
            .unwrap_or_default()
    }

    /// Each reviewer's newest verdict.
    pub fn latest_user_statuses(&self) -> BTreeMap<String, String> {
        let mut latest: BTreeMap<String, (i64, String)> = BTreeMap::new();
        for t in self.info().map(|i| i.transactions.as_slice()).unwrap_or_default() {
            if let TransactionKind::UserStatus { status } = &t.kind {
                let newer = latest.get(&t.user).map_or(true, |(ts, _)| t.timestamp >= *ts);
                if newer {
                    latest.insert(t.user.clone(), (t.timestamp, status.clone()));
                }
            }
        }
        latest.into_iter().map(|(user, (_, status))| (user, status)).collect()
    }
}
