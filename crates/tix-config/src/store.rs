//! Config documents as commits under `refs/configs/<name>`.
//!
//! Each commit's tree holds a single `config.json` blob. Storing an
//! unchanged document creates no commit.

use tix_repo::{Namespace, Repository, TreeEntry};
use tix_types::ObjectId;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

const CONFIG_BLOB: &str = "config.json";

/// What [`update_configs`] did to one local config ref.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigUpdate {
    /// The config did not exist locally and was copied.
    New { name: String },
    /// The local ref was fast-forwarded.
    Updated { name: String, target: ObjectId },
    /// Both sides changed; the local version was saved under `backup` and
    /// replaced by the remote one.
    Conflict {
        name: String,
        target: ObjectId,
        backup: String,
    },
}

pub fn conflict_ref(name: &str, remote: &str) -> String {
    format!("refs/conflicts/config-{name}-{remote}")
}

/// Names of the stored configs.
pub fn list_configs(repo: &Repository) -> ConfigResult<Vec<String>> {
    let ns = Namespace::CONFIGS;
    Ok(repo
        .list_refs(&ns.local_prefix())?
        .iter()
        .filter_map(|r| ns.suffix(r).map(str::to_string))
        .collect())
}

/// The raw document stored under `name`, or `None` if there is none.
pub fn get_config(repo: &Repository, name: &str) -> ConfigResult<Option<Vec<u8>>> {
    let ref_name = Namespace::CONFIGS.local_ref(name);
    if !repo.ref_exists(&ref_name)? {
        return Ok(None);
    }
    let commit = repo.read_commit(&repo.resolve_ref(&ref_name)?)?;
    let tree = repo.read_tree(&commit.tree)?;
    let entry = tree.get(CONFIG_BLOB).ok_or_else(|| ConfigError::Malformed {
        name: name.to_string(),
        reason: format!("no {CONFIG_BLOB} blob in {}", commit.tree.short_hex()),
    })?;
    Ok(Some(repo.read_data(&entry.object_id)?))
}

pub fn set_config(repo: &Repository, name: &str, data: &[u8]) -> ConfigResult<()> {
    let blob = repo.store_data(data)?;
    let tree = repo.store_tree(vec![TreeEntry::blob(CONFIG_BLOB, blob)])?;
    let ref_name = Namespace::CONFIGS.local_ref(name);

    let commit = if repo.ref_exists(&ref_name)? {
        let parent = repo.resolve_ref(&ref_name)?;
        if repo.read_commit(&parent)?.tree == tree {
            return Ok(());
        }
        repo.store_commit_with_parent(tree, parent)?
    } else {
        repo.store_commit(tree)?
    };
    repo.update_ref(&ref_name, commit)?;
    debug!(config = name, commit = %commit.short_hex(), "config stored");
    Ok(())
}

/// Bring every local config up to date with the tracking refs of `remote`.
///
/// A local config that is ahead of the remote is left alone. One that has
/// diverged is backed up to [`conflict_ref`] and replaced by the remote
/// version.
pub fn update_configs(repo: &Repository, remote: &str) -> ConfigResult<Vec<ConfigUpdate>> {
    let ns = Namespace::CONFIGS;
    let mut updates = Vec::new();

    for remote_ref in repo.list_refs(&ns.remote_prefix(remote))? {
        let Some(name) = ns.suffix(&remote_ref).map(str::to_string) else {
            continue;
        };
        let local_ref = ns.local_ref(&name);

        if !repo.ref_exists(&local_ref)? {
            repo.copy_ref(&remote_ref, &local_ref)?;
            updates.push(ConfigUpdate::New { name });
            continue;
        }

        let local = repo.resolve_ref(&local_ref)?;
        let target = repo.resolve_ref(&remote_ref)?;
        if local == target {
            continue;
        }
        let ancestor = repo.find_common_ancestor(&local, &target)?;
        if ancestor == Some(target) {
            continue;
        }
        if ancestor == Some(local) {
            repo.update_ref(&local_ref, target)?;
            updates.push(ConfigUpdate::Updated { name, target });
            continue;
        }

        let backup = conflict_ref(&name, remote);
        repo.copy_ref(&local_ref, &backup)?;
        repo.update_ref(&local_ref, target)?;
        warn!(
            config = %name,
            backup = %backup,
            "local config diverged from {remote}; local changes were discarded"
        );
        updates.push(ConfigUpdate::Conflict {
            name,
            target,
            backup,
        });
    }
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracking(name: &str) -> String {
        Namespace::CONFIGS.remote_ref("origin", name)
    }

    fn head(repo: &Repository, name: &str) -> ObjectId {
        repo.resolve_ref(&Namespace::CONFIGS.local_ref(name)).unwrap()
    }

    // ---- get / set ----

    #[test]
    fn set_then_get() {
        let repo = Repository::in_memory();
        assert_eq!(get_config(&repo, "labels").unwrap(), None);
        set_config(&repo, "labels", b"{}").unwrap();
        assert_eq!(get_config(&repo, "labels").unwrap(), Some(b"{}".to_vec()));
        assert_eq!(list_configs(&repo).unwrap(), vec!["labels"]);
    }

    #[test]
    fn unchanged_document_makes_no_commit() {
        let repo = Repository::in_memory();
        set_config(&repo, "ccb", b"1").unwrap();
        let first = head(&repo, "ccb");
        set_config(&repo, "ccb", b"1").unwrap();
        assert_eq!(head(&repo, "ccb"), first);
        set_config(&repo, "ccb", b"2").unwrap();
        let second = head(&repo, "ccb");
        assert_ne!(second, first);
        assert_eq!(repo.read_commit(&second).unwrap().parent(), Some(first));
    }

    // ---- reconciliation ----

    #[test]
    fn missing_local_config_is_copied() {
        let repo = Repository::in_memory();
        set_config(&repo, "labels", b"a").unwrap();
        let c = head(&repo, "labels");
        repo.update_ref(&tracking("checklists"), c).unwrap();

        let updates = update_configs(&repo, "origin").unwrap();
        assert_eq!(updates, vec![ConfigUpdate::New { name: "checklists".into() }]);
        assert_eq!(head(&repo, "checklists"), c);
    }

    #[test]
    fn fast_forward_and_local_ahead() {
        let repo = Repository::in_memory();
        set_config(&repo, "labels", b"a").unwrap();
        let c1 = head(&repo, "labels");
        set_config(&repo, "labels", b"b").unwrap();
        let c2 = head(&repo, "labels");

        // local ahead of remote: nothing to do
        repo.update_ref(&tracking("labels"), c1).unwrap();
        assert!(update_configs(&repo, "origin").unwrap().is_empty());
        assert_eq!(head(&repo, "labels"), c2);

        // remote ahead of local: fast-forward
        repo.update_ref(&Namespace::CONFIGS.local_ref("labels"), c1).unwrap();
        repo.update_ref(&tracking("labels"), c2).unwrap();
        let updates = update_configs(&repo, "origin").unwrap();
        assert_eq!(
            updates,
            vec![ConfigUpdate::Updated { name: "labels".into(), target: c2 }]
        );
        assert_eq!(head(&repo, "labels"), c2);
    }

    #[test]
    fn diverged_config_is_backed_up() {
        let repo = Repository::in_memory();
        set_config(&repo, "labels", b"base").unwrap();
        let base = head(&repo, "labels");
        set_config(&repo, "labels", b"local").unwrap();
        let local = head(&repo, "labels");

        let blob = repo.store_data(b"remote").unwrap();
        let tree = repo
            .store_tree(vec![TreeEntry::blob(CONFIG_BLOB, blob)])
            .unwrap();
        let remote = repo.store_commit_with_parent(tree, base).unwrap();
        repo.update_ref(&tracking("labels"), remote).unwrap();

        let updates = update_configs(&repo, "origin").unwrap();
        let backup = conflict_ref("labels", "origin");
        assert_eq!(
            updates,
            vec![ConfigUpdate::Conflict {
                name: "labels".into(),
                target: remote,
                backup: backup.clone(),
            }]
        );
        assert_eq!(repo.resolve_ref(&backup).unwrap(), local);
        assert_eq!(get_config(&repo, "labels").unwrap(), Some(b"remote".to_vec()));
    }
}
