use tix_repo::Repository;
use tracing::debug;

use crate::ccb::CcbConfig;
use crate::checklist::ChecklistConfig;
use crate::error::ConfigResult;
use crate::label::{Label, LabelConfig};
use crate::store::{get_config, set_config};

pub const LABELS: &str = "labels";
pub const CHECKLISTS: &str = "checklists";
pub const CCB: &str = "ccb";

/// The tracker configuration of one repository, loaded once and handed to
/// every call that validates labels, checklists or CCB membership.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigCache {
    pub labels: LabelConfig,
    pub checklists: ChecklistConfig,
    pub ccb: CcbConfig,
}

impl ConfigCache {
    /// Read every config document. A missing document yields an empty value.
    pub fn load(repo: &Repository) -> ConfigResult<Self> {
        let labels = match get_config(repo, LABELS)? {
            Some(data) => LabelConfig::parse(&data)?,
            None => LabelConfig::default(),
        };
        let checklists = match get_config(repo, CHECKLISTS)? {
            Some(data) => ChecklistConfig::parse(&data)?,
            None => ChecklistConfig::default(),
        };
        let ccb = match get_config(repo, CCB)? {
            Some(data) => CcbConfig::parse(&data)?,
            None => CcbConfig::default(),
        };
        debug!(
            labels = labels.labels().count(),
            checklists = checklists.labels().len(),
            ccb = ccb.members.len(),
            "config loaded"
        );
        Ok(Self {
            labels,
            checklists,
            ccb,
        })
    }

    /// Add a label to the label configuration and persist it.
    pub fn add_label(&mut self, repo: &Repository, label: Label) -> ConfigResult<()> {
        self.labels.append_label(label)?;
        self.store_labels(repo)
    }

    pub fn store_labels(&self, repo: &Repository) -> ConfigResult<()> {
        set_config(repo, LABELS, &self.labels.to_json()?)
    }

    pub fn store_checklists(&self, repo: &Repository) -> ConfigResult<()> {
        set_config(repo, CHECKLISTS, &serde_json::to_vec_pretty(&self.checklists)?)
    }

    pub fn store_ccb(&self, repo: &Repository) -> ConfigResult<()> {
        set_config(repo, CCB, &serde_json::to_vec_pretty(&self.ccb)?)
    }
}
