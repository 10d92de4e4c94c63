//! Checklist templates and question states.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::label::Label;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecklistState {
    #[default]
    #[serde(rename = "TBD")]
    Tbd,
    Passed,
    Failed,
    NotApplicable,
}

impl ChecklistState {
    pub fn short(&self) -> &'static str {
        match self {
            Self::Tbd => "TBD",
            Self::Passed => "P",
            Self::Failed => "F",
            Self::NotApplicable => "NA",
        }
    }
}

impl fmt::Display for ChecklistState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tbd => "TBD",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::NotApplicable => "NA",
        })
    }
}

/// Accepts any case-insensitive input starting with `tbd`, `p`, `f` or `na`.
impl FromStr for ChecklistState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.starts_with("tbd") {
            Ok(Self::Tbd)
        } else if lower.starts_with("na") {
            Ok(Self::NotApplicable)
        } else if lower.starts_with('p') {
            Ok(Self::Passed)
        } else if lower.starts_with('f') {
            Ok(Self::Failed)
        } else {
            Err(ConfigError::InvalidState(s.to_string()))
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistQuestion {
    pub question: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub state: ChecklistState,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistSection {
    pub title: String,
    #[serde(default)]
    pub questions: Vec<ChecklistQuestion>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub label: Label,
    pub title: String,
    /// Non-empty when the checklist may no longer be added to tickets.
    #[serde(default)]
    pub deprecated: String,
    #[serde(default)]
    pub sections: Vec<ChecklistSection>,
}

impl Checklist {
    /// Failed if any question failed, else TBD if any is still TBD, else
    /// Passed.
    pub fn compound_state(&self) -> ChecklistState {
        let states = || self.sections.iter().flat_map(|s| &s.questions).map(|q| q.state);
        if states().any(|s| s == ChecklistState::Failed) {
            ChecklistState::Failed
        } else if states().any(|s| s == ChecklistState::Tbd) {
            ChecklistState::Tbd
        } else {
            ChecklistState::Passed
        }
    }

    pub fn is_deprecated(&self) -> bool {
        !self.deprecated.is_empty()
    }
}

impl fmt::Display for Checklist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}]", self.title, self.compound_state())?;
        for (sn, section) in self.sections.iter().enumerate() {
            writeln!(f, "#### {} ####", section.title)?;
            for (qn, q) in section.questions.iter().enumerate() {
                writeln!(f, "({}.{}) {} [{}]", sn + 1, qn + 1, q.question, q.state)?;
                if !q.comment.is_empty() {
                    writeln!(f, "# {}", q.comment.replace('\n', "\n# "))?;
                }
            }
        }
        Ok(())
    }
}

/// Checklist templates keyed by their `checklist:` label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChecklistConfig(BTreeMap<Label, Checklist>);

impl ChecklistConfig {
    pub fn parse(data: &[u8]) -> ConfigResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn insert(&mut self, checklist: Checklist) {
        self.0.insert(checklist.label.clone(), checklist);
    }

    pub fn get(&self, label: &Label) -> ConfigResult<&Checklist> {
        self.0
            .get(label)
            .ok_or_else(|| ConfigError::InvalidChecklist(label.to_string()))
    }

    /// Labels of the checklists that are not deprecated.
    pub fn labels(&self) -> Vec<Label> {
        self.0
            .values()
            .filter(|c| !c.is_deprecated())
            .map(|c| c.label.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(state: ChecklistState) -> ChecklistQuestion {
        ChecklistQuestion {
            question: "ok?".into(),
            comment: String::new(),
            state,
        }
    }

    fn checklist(label: &str, states: &[ChecklistState]) -> Checklist {
        Checklist {
            label: label.into(),
            title: "Review".into(),
            deprecated: String::new(),
            sections: vec![ChecklistSection {
                title: "General".into(),
                questions: states.iter().copied().map(question).collect(),
            }],
        }
    }

    // ---- state parsing ----

    #[test]
    fn state_parses_by_prefix() {
        assert_eq!("tbd".parse::<ChecklistState>().unwrap(), ChecklistState::Tbd);
        assert_eq!("Pass".parse::<ChecklistState>().unwrap(), ChecklistState::Passed);
        assert_eq!(" FAIL ".parse::<ChecklistState>().unwrap(), ChecklistState::Failed);
        assert!("n/a".parse::<ChecklistState>().is_err());
        assert_eq!("NA".parse::<ChecklistState>().unwrap(), ChecklistState::NotApplicable);
        assert!("maybe".parse::<ChecklistState>().is_err());
    }

    // ---- compound state ----

    #[test]
    fn compound_state_rules() {
        use ChecklistState::*;
        assert_eq!(checklist("checklist:a", &[Passed, Failed, Tbd]).compound_state(), Failed);
        assert_eq!(checklist("checklist:a", &[Passed, Tbd]).compound_state(), Tbd);
        assert_eq!(checklist("checklist:a", &[Passed, NotApplicable]).compound_state(), Passed);
        assert_eq!(checklist("checklist:a", &[]).compound_state(), Passed);
    }

    // ---- config ----

    #[test]
    fn config_lookup_and_deprecation() {
        let mut config = ChecklistConfig::default();
        config.insert(checklist("checklist:sw", &[]));
        let mut old = checklist("checklist:old", &[]);
        old.deprecated = "use checklist:sw".into();
        config.insert(old);

        assert_eq!(config.labels(), vec![Label::from("checklist:sw")]);
        assert!(config.get(&"checklist:old".into()).is_ok());
        assert_eq!(
            config.get(&"checklist:nope".into()).unwrap_err().to_string(),
            "invalid checklist checklist:nope"
        );

        let json = serde_json::to_vec(&config).unwrap();
        assert_eq!(ChecklistConfig::parse(&json).unwrap(), config);
    }

    #[test]
    fn display_lists_questions() {
        let mut c = checklist("checklist:sw", &[ChecklistState::Passed]);
        c.sections[0].questions[0].comment = "line one\nline two".into();
        let text = c.to_string();
        assert!(text.starts_with("Review [PASSED]\n"));
        assert!(text.contains("(1.1) ok? [PASSED]"));
        assert!(text.contains("# line one\n# line two"));
    }
}
