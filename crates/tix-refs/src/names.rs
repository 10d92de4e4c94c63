//! Ref name validation following git-style conventions.
//!
//! Valid ref names:
//! - Must start with `refs/`
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` or `@{`
//! - Must not end with `/` or `.lock`
//! - Components between slashes must be non-empty and not start with `.`

use crate::error::{RefError, Result};

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a canonical ref name.
///
/// # Examples
///
/// ```
/// use tix_refs::names::validate_ref_name;
///
/// assert!(validate_ref_name("refs/bugs/0a1b").is_ok());
/// assert!(validate_ref_name("refs/remotes/origin/bugs/0a1b").is_ok());
/// assert!(validate_ref_name("bugs/0a1b").is_err());
/// assert!(validate_ref_name("refs/bugs/../x").is_err());
/// ```
pub fn validate_ref_name(name: &str) -> Result<()> {
    if !name.starts_with("refs/") {
        return Err(invalid(name, "must start with 'refs/'"));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }
    if name.ends_with('/') {
        return Err(invalid(name, "must not end with '/'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }
    Ok(())
}

/// Validate a remote name. Must be a simple identifier (no slashes).
pub fn validate_remote_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "remote name must not be empty"));
    }
    if name.contains('/') {
        return Err(invalid(name, "remote name must not contain '/'"));
    }
    if name.starts_with('.') {
        return Err(invalid(name, "remote name must not start with '.'"));
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(invalid(
            name,
            format!("remote name contains forbidden character: {ch:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_entity_refs() {
        assert!(validate_ref_name("refs/bugs/abc123").is_ok());
        assert!(validate_ref_name("refs/identities/abc123").is_ok());
        assert!(validate_ref_name("refs/configs/labels").is_ok());
        assert!(validate_ref_name("refs/conflicts/config-labels-origin").is_ok());
    }

    #[test]
    fn reject_outside_refs() {
        assert!(validate_ref_name("").is_err());
        assert!(validate_ref_name("HEAD").is_err());
    }

    #[test]
    fn reject_forbidden_chars() {
        for bad in ["refs/a b", "refs/a~b", "refs/a:b", "refs/a*b", "refs/a\\b"] {
            assert!(validate_ref_name(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn reject_bad_components() {
        assert!(validate_ref_name("refs//bugs").is_err());
        assert!(validate_ref_name("refs/bugs/").is_err());
        assert!(validate_ref_name("refs/.hidden/x").is_err());
        assert!(validate_ref_name("refs/bugs/x.lock").is_err());
        assert!(validate_ref_name("refs/x@{0}").is_err());
    }

    #[test]
    fn remote_names() {
        assert!(validate_remote_name("origin").is_ok());
        assert!(validate_remote_name("").is_err());
        assert!(validate_remote_name("a/b").is_err());
        assert!(validate_remote_name("has space").is_err());
    }
}
