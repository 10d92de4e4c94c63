//! Tracker configuration for tix.
//!
//! Labels, checklist templates and the CCB member list are not local
//! settings: they are JSON documents committed to the repository under
//! `refs/configs/<name>` and shared through push and pull like tickets.
//! [`ConfigCache`] loads them once and is passed explicitly to whatever
//! needs them.

pub mod cache;
pub mod ccb;
pub mod checklist;
pub mod error;
pub mod label;
pub mod store;

pub use cache::ConfigCache;
pub use ccb::CcbConfig;
pub use checklist::{Checklist, ChecklistConfig, ChecklistQuestion, ChecklistSection, ChecklistState};
pub use error::{ConfigError, ConfigResult};
pub use label::{Label, LabelConfig, LabelNode, LabelRule};
pub use store::{get_config, list_configs, set_config, update_configs, ConfigUpdate};
