use serde::{Deserialize, Serialize};

/// A refspec mapping source refs to destination refs.
///
/// A single trailing `*` on both sides matches any suffix, as in
/// `+refs/bugs/*:refs/remotes/origin/bugs/*`. A leading `+` allows
/// non-fast-forward updates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSpec {
    pub src: String,
    pub dst: String,
    pub force: bool,
}

impl RefSpec {
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            force: false,
        }
    }

    pub fn forced(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            force: true,
        }
    }

    /// Parse `"+refs/bugs/*:refs/remotes/origin/bugs/*"`. Without a colon the
    /// destination equals the source.
    pub fn parse(s: &str) -> Option<Self> {
        let (force, rest) = match s.strip_prefix('+') {
            Some(stripped) => (true, stripped),
            None => (false, s),
        };
        if rest.is_empty() {
            return None;
        }
        let (src, dst) = rest.split_once(':').unwrap_or((rest, rest));
        if src.is_empty() || dst.is_empty() || src.ends_with('*') != dst.ends_with('*') {
            return None;
        }
        Some(Self {
            src: src.into(),
            dst: dst.into(),
            force,
        })
    }

    /// The fixed part of the source pattern, used to list candidate refs.
    pub fn src_prefix(&self) -> &str {
        self.src.trim_end_matches('*')
    }

    /// Map a source ref name to its destination, or `None` if it does not
    /// match the source pattern.
    pub fn map(&self, name: &str) -> Option<String> {
        match self.src.strip_suffix('*') {
            Some(prefix) => {
                let suffix = name.strip_prefix(prefix)?;
                let dst_prefix = self.dst.trim_end_matches('*');
                Some(format!("{dst_prefix}{suffix}"))
            }
            None if name == self.src => Some(self.dst.clone()),
            None => None,
        }
    }
}

impl std::fmt::Display for RefSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.force {
            write!(f, "+")?;
        }
        if self.src == self.dst {
            write!(f, "{}", self.src)
        } else {
            write!(f, "{}:{}", self.src, self.dst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_forced_glob() {
        let spec = RefSpec::parse("+refs/bugs/*:refs/remotes/origin/bugs/*").unwrap();
        assert!(spec.force);
        assert_eq!(spec.src_prefix(), "refs/bugs/");
        assert_eq!(
            spec.map("refs/bugs/abc").as_deref(),
            Some("refs/remotes/origin/bugs/abc")
        );
        assert_eq!(spec.map("refs/identities/abc"), None);
    }

    #[test]
    fn parse_without_colon() {
        let spec = RefSpec::parse("refs/bugs/*").unwrap();
        assert!(!spec.force);
        assert_eq!(spec.map("refs/bugs/x").as_deref(), Some("refs/bugs/x"));
        assert_eq!(spec.to_string(), "refs/bugs/*");
    }

    #[test]
    fn parse_rejects_mismatched_globs() {
        assert!(RefSpec::parse("refs/bugs/*:refs/x").is_none());
        assert!(RefSpec::parse("+").is_none());
        assert!(RefSpec::parse(":refs/x").is_none());
    }

    #[test]
    fn exact_spec_maps_only_itself() {
        let spec = RefSpec::new("refs/configs/labels", "refs/remotes/o/configs/labels");
        assert!(spec.map("refs/configs/labels").is_some());
        assert!(spec.map("refs/configs/labels2").is_none());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let spec = RefSpec::forced("refs/bugs/*", "refs/remotes/o/bugs/*");
        assert_eq!(RefSpec::parse(&spec.to_string()).unwrap(), spec);
    }
}
