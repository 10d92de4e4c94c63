//! Labels and the label configuration.
//!
//! The configuration is a tree: a plain string is a label, an object with a
//! `prefix` groups nested labels under `<prefix>:`, and an object with a
//! `name` is a label carrying a deprecation message.
//!
//! ```json
//! { "labels": [
//!     "blocker",
//!     { "name": "legacy", "deprecationMessage": "use blocker" },
//!     { "prefix": "repo", "labels": ["core", "web"] }
//! ] }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// A ticket label such as `repo:core` or `workflow:eng`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub const CHECKLIST_PREFIX: &'static str = "checklist:";
    pub const WORKFLOW_PREFIX: &'static str = "workflow:";
    pub const REPO_PREFIX: &'static str = "repo:";
    pub const IMPACT_PREFIX: &'static str = "impact:";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_checklist(&self) -> bool {
        self.0.starts_with(Self::CHECKLIST_PREFIX)
    }

    pub fn is_workflow(&self) -> bool {
        self.0.starts_with(Self::WORKFLOW_PREFIX)
    }

    pub fn is_repo(&self) -> bool {
        self.0.starts_with(Self::REPO_PREFIX)
    }

    pub fn is_impact(&self) -> bool {
        self.0.starts_with(Self::IMPACT_PREFIX)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.0.trim().is_empty() {
            return Err(ConfigError::InvalidLabel("label is empty".into()));
        }
        if self.0.contains('\n') {
            return Err(ConfigError::InvalidLabel(
                "label should be a single line".into(),
            ));
        }
        if self.0.chars().any(char::is_control) {
            return Err(ConfigError::InvalidLabel(
                "label is not fully printable".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One node of the serialized label tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelNode {
    Name(String),
    Compound {
        prefix: String,
        #[serde(default)]
        labels: Vec<LabelNode>,
        #[serde(
            default,
            rename = "deprecationMessage",
            skip_serializing_if = "String::is_empty"
        )]
        deprecation_message: String,
    },
    Simple {
        name: String,
        #[serde(
            default,
            rename = "deprecationMessage",
            skip_serializing_if = "String::is_empty"
        )]
        deprecation_message: String,
    },
}

impl LabelNode {
    fn simple_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) | Self::Simple { name, .. } => Some(name),
            Self::Compound { .. } => None,
        }
    }

    fn prefix(&self) -> Option<&str> {
        match self {
            Self::Compound { prefix, .. } => Some(prefix),
            _ => None,
        }
    }

    /// Full names and deprecation messages of every label below this node.
    /// A deprecated prefix deprecates everything under it.
    fn flatten(&self) -> Vec<(String, String)> {
        match self {
            Self::Name(name) => vec![(name.clone(), String::new())],
            Self::Simple {
                name,
                deprecation_message,
            } => vec![(name.clone(), deprecation_message.clone())],
            Self::Compound {
                prefix,
                labels,
                deprecation_message,
            } => labels
                .iter()
                .flat_map(LabelNode::flatten)
                .map(|(name, message)| {
                    let message = if deprecation_message.is_empty() {
                        message
                    } else {
                        deprecation_message.clone()
                    };
                    (format!("{prefix}:{name}"), message)
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SerializedLabels {
    #[serde(default)]
    labels: Vec<LabelNode>,
}

/// Settings of a single configured label.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelRule {
    /// Non-empty when the label may no longer be added.
    pub deprecation_message: String,
}

impl LabelRule {
    pub fn is_deprecated(&self) -> bool {
        !self.deprecation_message.is_empty()
    }
}

/// The configured labels, flattened for lookup and kept as a tree for
/// storing back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelConfig {
    flat: BTreeMap<Label, LabelRule>,
    tree: SerializedLabels,
}

impl LabelConfig {
    pub fn parse(data: &[u8]) -> ConfigResult<Self> {
        let tree: SerializedLabels = serde_json::from_slice(data)?;
        let mut flat = BTreeMap::new();
        for (name, deprecation_message) in tree.labels.iter().flat_map(LabelNode::flatten) {
            let label = Label(name);
            if flat.contains_key(&label) {
                return Err(ConfigError::DuplicateLabel(label.0));
            }
            flat.insert(label, LabelRule { deprecation_message });
        }
        Ok(Self { flat, tree })
    }

    pub fn to_json(&self) -> ConfigResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.tree)?)
    }

    pub fn get(&self, label: &Label) -> ConfigResult<&LabelRule> {
        self.flat
            .get(label)
            .ok_or_else(|| ConfigError::UnknownLabel(label.to_string()))
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.flat.contains_key(label)
    }

    /// Every configured label, sorted.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.flat.keys()
    }

    /// Add `label` to the tree, creating prefix groups as needed. Nothing is
    /// persisted until the config is stored.
    pub fn append_label(&mut self, label: Label) -> ConfigResult<()> {
        label.validate()?;
        if self.flat.contains_key(&label) {
            return Err(ConfigError::LabelAllocated(label.0));
        }
        let parts: Vec<&str> = label.0.split(':').collect();
        let (last, prefixes) = parts
            .split_last()
            .ok_or_else(|| ConfigError::InvalidLabel("label is empty".into()))?;

        let mut level = &mut self.tree.labels;
        for (i, prefix) in prefixes.iter().enumerate() {
            if level.iter().any(|n| n.simple_name() == Some(*prefix)) {
                return Err(ConfigError::LabelAllocated(prefixes[..=i].join(":")));
            }
            let idx = match level.iter().position(|n| n.prefix() == Some(*prefix)) {
                Some(idx) => idx,
                None => {
                    level.push(LabelNode::Compound {
                        prefix: prefix.to_string(),
                        labels: Vec::new(),
                        deprecation_message: String::new(),
                    });
                    level.len() - 1
                }
            };
            level = match &mut level[idx] {
                LabelNode::Compound { labels, .. } => labels,
                _ => return Err(ConfigError::LabelAllocated(prefixes[..=i].join(":"))),
            };
        }
        if level.iter().any(|n| n.simple_name() == Some(*last)) {
            return Err(ConfigError::LabelAllocated(label.0));
        }
        level.push(LabelNode::Name(last.to_string()));
        self.flat.insert(label, LabelRule::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
      "labels": [
        "simple-label",
        { "name": "simple-label-but-deprecated", "deprecationMessage": "I'm sure there is a reason" },
        {
          "prefix": "impact",
          "labels": [
            "vyper-sdd",
            { "name": "dep", "deprecationMessage": "There's no reason" },
            { "prefix": "another", "labels": [] }
          ]
        },
        { "prefix": "old", "labels": ["a"], "deprecationMessage": "gone" }
      ]
    }"#;

    // ---- Label ----

    #[test]
    fn label_prefixes() {
        assert!(Label::from("workflow:eng").is_workflow());
        assert!(Label::from("checklist:sw").is_checklist());
        assert!(Label::from("repo:core").is_repo());
        assert!(Label::from("impact:x").is_impact());
        assert!(!Label::from("bug").is_repo());
    }

    #[test]
    fn label_validation() {
        assert!(Label::from("fine").validate().is_ok());
        assert!(Label::from("").validate().is_err());
        assert!(Label::from("two\nlines").validate().is_err());
        assert!(Label::from("bell\u{7}").validate().is_err());
    }

    // ---- parsing ----

    #[test]
    fn parse_flattens_tree() {
        let config = LabelConfig::parse(CONFIG.as_bytes()).unwrap();
        let labels: Vec<_> = config.labels().map(Label::as_str).collect();
        assert_eq!(
            labels,
            vec![
                "impact:dep",
                "impact:vyper-sdd",
                "old:a",
                "simple-label",
                "simple-label-but-deprecated"
            ]
        );
        assert!(!config.get(&"simple-label".into()).unwrap().is_deprecated());
        assert_eq!(
            config.get(&"impact:dep".into()).unwrap().deprecation_message,
            "There's no reason"
        );
        assert_eq!(config.get(&"old:a".into()).unwrap().deprecation_message, "gone");
    }

    #[test]
    fn unknown_label_message() {
        let config = LabelConfig::parse(CONFIG.as_bytes()).unwrap();
        let err = config.get(&"nope".into()).unwrap_err();
        assert_eq!(err.to_string(), "Label nope does not exist");
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let json = r#"{"labels": ["a", {"name": "a", "deprecationMessage": "x"}]}"#;
        assert!(matches!(
            LabelConfig::parse(json.as_bytes()),
            Err(ConfigError::DuplicateLabel(name)) if name == "a"
        ));
    }

    // ---- appending ----

    #[test]
    fn append_creates_prefix_groups() {
        let mut config = LabelConfig::parse(CONFIG.as_bytes()).unwrap();
        config.append_label("repo:core".into()).unwrap();
        config.append_label("impact:another:deep".into()).unwrap();
        assert!(config.contains(&"repo:core".into()));

        let reparsed = LabelConfig::parse(&config.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, config);
        assert!(reparsed.contains(&"impact:another:deep".into()));
    }

    #[test]
    fn append_conflicts_with_existing_names() {
        let mut config = LabelConfig::parse(CONFIG.as_bytes()).unwrap();
        assert!(matches!(
            config.append_label("simple-label".into()),
            Err(ConfigError::LabelAllocated(_))
        ));
        assert!(matches!(
            config.append_label("simple-label:child".into()),
            Err(ConfigError::LabelAllocated(name)) if name == "simple-label"
        ));
    }

    #[test]
    fn empty_config_appends() {
        let mut config = LabelConfig::default();
        config.append_label("bug".into()).unwrap();
        assert_eq!(config.labels().count(), 1);
    }
}
