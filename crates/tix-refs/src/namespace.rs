//! Ref layout of an entity family.

use crate::refspec::RefSpec;

/// The ref namespace owned by one entity family.
///
/// | purpose | ref |
/// |---|---|
/// | local | `refs/<family>/<id>` |
/// | remote-tracking | `refs/remotes/<remote>/<family>/<id>` |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Namespace {
    family: &'static str,
}

impl Namespace {
    pub const BUGS: Self = Self::new("bugs");
    pub const IDENTITIES: Self = Self::new("identities");
    pub const CONFIGS: Self = Self::new("configs");

    pub const fn new(family: &'static str) -> Self {
        Self { family }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn local_prefix(&self) -> String {
        format!("refs/{}/", self.family)
    }

    pub fn local_ref(&self, suffix: &str) -> String {
        format!("refs/{}/{suffix}", self.family)
    }

    pub fn remote_prefix(&self, remote: &str) -> String {
        format!("refs/remotes/{remote}/{}/", self.family)
    }

    pub fn remote_ref(&self, remote: &str, suffix: &str) -> String {
        format!("refs/remotes/{remote}/{}/{suffix}", self.family)
    }

    /// `+refs/<family>/*:refs/remotes/<remote>/<family>/*`
    pub fn fetch_refspec(&self, remote: &str) -> RefSpec {
        RefSpec::forced(
            format!("{}*", self.local_prefix()),
            format!("{}*", self.remote_prefix(remote)),
        )
    }

    /// `refs/<family>/*`
    pub fn push_refspec(&self) -> RefSpec {
        let spec = format!("{}*", self.local_prefix());
        RefSpec::new(spec.clone(), spec)
    }

    /// Extract the id part of a ref in this namespace (local or tracking).
    pub fn suffix<'a>(&self, name: &'a str) -> Option<&'a str> {
        let marker = format!("{}/", self.family);
        let rest = match name.strip_prefix("refs/remotes/") {
            Some(rest) => rest.split_once('/')?.1,
            None => name.strip_prefix("refs/")?,
        };
        rest.strip_prefix(marker.as_str())
            .filter(|s| !s.is_empty() && !s.contains('/'))
    }
}
