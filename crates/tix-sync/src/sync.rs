//! Fetch, push and pull against a registered remote.

use std::collections::HashSet;
use std::sync::Arc;

use tix_config::update_configs;
use tix_entity::{Bug, Identity};
use tix_merge::{merge_all, MergeResult};
use tix_repo::{Namespace, Repository};
use tix_store::ObjectStore;
use tix_types::ObjectId;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::types::{FetchResult, MergeReport, PullResult, PushResult, RefRejection, RefUpdate};

/// The ref families exchanged with a remote, in merge order.
pub const FAMILIES: [Namespace; 3] = [Namespace::IDENTITIES, Namespace::BUGS, Namespace::CONFIGS];

fn current(repo: &Repository, name: &str) -> SyncResult<Option<ObjectId>> {
    if repo.ref_exists(name)? {
        Ok(Some(repo.resolve_ref(name)?))
    } else {
        Ok(None)
    }
}

/// Copy the objects reachable from `head` that `to` does not have yet.
fn transfer(from: &Repository, to: &Repository, head: &ObjectId) -> SyncResult<usize> {
    let missing = from
        .graph()
        .missing_objects(head, |id| to.objects().exists(id))?;
    for id in &missing {
        let object = from.objects().read_required(id)?;
        to.objects().write(&object)?;
    }
    Ok(missing.len())
}

// ---- fetch ----

/// Mirror the remote's refs under `refs/remotes/<remote>/`.
///
/// Tracking refs whose entity disappeared from the remote are pruned. The
/// local ref goes with them unless it holds commits the remote never had.
pub fn fetch(repo: &Repository, remote_name: &str) -> SyncResult<FetchResult> {
    let remote = repo.remote(remote_name)?;
    info!(remote = remote_name, "fetch started");

    let mut result = FetchResult::default();
    for ns in FAMILIES {
        fetch_family(repo, &remote, remote_name, ns, &mut result)?;
    }

    info!(
        remote = remote_name,
        objects = result.objects_received,
        updated = result.refs_updated.len(),
        pruned = result.refs_pruned.len(),
        "fetch finished"
    );
    Ok(result)
}

fn fetch_family(
    repo: &Repository,
    remote: &Repository,
    remote_name: &str,
    ns: Namespace,
    result: &mut FetchResult,
) -> SyncResult<()> {
    let spec = ns.fetch_refspec(remote_name);
    let mut seen = HashSet::new();

    for src in remote.list_refs(spec.src_prefix())? {
        let Some(dst) = spec.map(&src) else {
            continue;
        };
        let head = remote.resolve_ref(&src)?;
        result.objects_received += transfer(remote, repo, &head)?;

        let old = current(repo, &dst)?;
        if old != Some(head) {
            repo.update_ref(&dst, head)?;
            debug!(tracking_ref = %dst, head = %head.short_hex(), "tracking ref updated");
            result.refs_updated.push(RefUpdate {
                name: dst.clone(),
                old,
                new: head,
            });
        }
        seen.insert(dst);
    }

    for tracking in repo.list_refs(&ns.remote_prefix(remote_name))? {
        if seen.contains(&tracking) {
            continue;
        }
        let last_known = repo.resolve_ref(&tracking)?;
        repo.remove_ref(&tracking)?;
        let Some(suffix) = ns.suffix(&tracking) else {
            result.refs_pruned.push(tracking);
            continue;
        };
        let local = ns.local_ref(suffix);
        if let Some(head) = current(repo, &local)? {
            if repo.is_ancestor(&head, &last_known)? {
                repo.remove_ref(&local)?;
                debug!(local_ref = %local, "removed with the remote");
                result.refs_removed.push(local);
            } else {
                warn!(
                    local_ref = %local,
                    remote = remote_name,
                    "removed on the remote but has local changes; keeping it"
                );
            }
        }
        result.refs_pruned.push(tracking);
    }
    Ok(())
}

// ---- push ----

/// Send local refs to the remote. A ref the remote already has is only
/// moved forward; anything else is reported in [`PushResult::rejected`].
pub fn push(repo: &Repository, remote_name: &str) -> SyncResult<PushResult> {
    let remote = repo.remote(remote_name)?;
    info!(remote = remote_name, "push started");

    let mut result = PushResult::default();
    for ns in FAMILIES {
        let spec = ns.push_refspec();
        for src in repo.list_refs(spec.src_prefix())? {
            let Some(dst) = spec.map(&src) else {
                continue;
            };
            let Some(suffix) = ns.suffix(&src) else {
                continue;
            };
            let tracking = ns.remote_ref(remote_name, suffix);
            let head = repo.resolve_ref(&src)?;
            let old = current(&remote, &dst)?;
            if old == Some(head) {
                repo.update_ref(&tracking, head)?;
                continue;
            }

            result.objects_sent += transfer(repo, &remote, &head)?;
            if let Some(old) = old {
                if !remote.is_ancestor(&old, &head)? {
                    warn!(ref_name = %dst, remote = remote_name, "push rejected: non-fast-forward");
                    result.rejected.push(RefRejection {
                        name: dst,
                        reason: "non-fast-forward".to_string(),
                    });
                    continue;
                }
            }
            remote.update_ref(&dst, head)?;
            repo.update_ref(&tracking, head)?;
            result.refs_updated.push(RefUpdate {
                name: dst,
                old,
                new: head,
            });
        }
    }

    info!(
        remote = remote_name,
        objects = result.objects_sent,
        updated = result.refs_updated.len(),
        rejected = result.rejected.len(),
        "push finished"
    );
    Ok(result)
}

/// Delete the entity `suffix` of family `ns` on the remote, along with the
/// local tracking ref. Returns `false` if the remote did not have it.
pub fn push_removal(
    repo: &Repository,
    remote_name: &str,
    ns: Namespace,
    suffix: &str,
) -> SyncResult<bool> {
    let remote = repo.remote(remote_name)?;
    repo.remove_ref(&ns.remote_ref(remote_name, suffix))?;
    let removed = remote.remove_ref(&ns.local_ref(suffix))?;
    if removed {
        info!(remote = remote_name, family = ns.family(), id = suffix, "removed on remote");
    }
    Ok(removed)
}

// ---- pull ----

/// Callbacks run by [`pull_with`] and [`merge_with`] as results come in.
pub trait PullHooks {
    fn fetched(&mut self, _result: &FetchResult) {}
    fn identity_merged(&mut self, _result: &MergeResult<Identity>) {}
    fn bug_merged(&mut self, _result: &MergeResult<Bug>) {}
}

impl PullHooks for () {}

/// Merge every tracking ref of `remote_name`, identities first.
///
/// Merge streams are always drained to the end; failures are collected in
/// [`MergeReport::failures`] rather than stopping the merge.
pub fn merge_with(
    repo: &Arc<Repository>,
    remote_name: &str,
    hooks: &mut impl PullHooks,
) -> SyncResult<MergeReport> {
    let mut report = MergeReport::default();
    for result in merge_all::<Identity>(Arc::clone(repo), remote_name)? {
        report.identities.record(&result, "identity", &mut report.failures);
        hooks.identity_merged(&result);
    }
    for result in merge_all::<Bug>(Arc::clone(repo), remote_name)? {
        report.bugs.record(&result, "ticket", &mut report.failures);
        hooks.bug_merged(&result);
    }
    Ok(report)
}

/// Fetch, then merge identities, bugs and configs from the tracking refs.
pub fn pull(repo: &Arc<Repository>, remote_name: &str) -> SyncResult<PullResult> {
    pull_with(repo, remote_name, &mut ())
}

/// [`pull`], reporting progress to `hooks`.
pub fn pull_with(
    repo: &Arc<Repository>,
    remote_name: &str,
    hooks: &mut impl PullHooks,
) -> SyncResult<PullResult> {
    let fetched = fetch(repo, remote_name)?;
    hooks.fetched(&fetched);
    let merged = merge_with(repo, remote_name, hooks)?;
    let configs = update_configs(repo, remote_name)?;

    info!(
        remote = remote_name,
        new = merged.bugs.new.len(),
        updated = merged.bugs.updated.len(),
        failures = merged.failures.len(),
        "pull finished"
    );
    Ok(PullResult {
        fetch: fetched,
        identities: merged.identities,
        bugs: merged.bugs,
        configs,
        failures: merged.failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tix_config::{get_config, set_config, ConfigUpdate};
    use tix_entity::edits;
    use tix_types::EntityId;

    const T0: i64 = 1_700_000_000;

    fn ann() -> EntityId {
        EntityId::from_hash([1; 32])
    }

    fn bob() -> EntityId {
        EntityId::from_hash([2; 32])
    }

    /// Two replicas sharing one origin.
    fn replicas() -> (Arc<Repository>, Arc<Repository>, Arc<Repository>) {
        let origin = Arc::new(Repository::in_memory());
        let a = Arc::new(Repository::in_memory());
        let b = Arc::new(Repository::in_memory());
        a.add_remote("origin", Arc::clone(&origin)).unwrap();
        b.add_remote("origin", Arc::clone(&origin)).unwrap();
        (origin, a, b)
    }

    fn new_bug(repo: &Repository) -> Bug {
        let mut bug = edits::create(ann(), T0, "crash", "it crashes", vec![]).unwrap();
        bug.commit(repo).unwrap();
        bug
    }

    /// Three commits of three comments each.
    fn comment_burst(repo: &Repository, id: EntityId, author: EntityId, tag: &str) {
        let mut bug = Bug::read_local(repo, id).unwrap();
        for commit in 0..3 {
            for n in 0..3 {
                let message = format!("{tag} {commit}.{n}");
                edits::add_comment(&mut bug, author, T0 + 10, &message, vec![]).unwrap();
            }
            bug.commit(repo).unwrap();
        }
    }

    fn op_ids(repo: &Repository, id: EntityId) -> Vec<EntityId> {
        Bug::read_local(repo, id)
            .unwrap()
            .operations()
            .map(|op| op.id())
            .collect()
    }

    #[derive(Default)]
    struct Seen {
        refs_fetched: usize,
        identities: usize,
        bugs: Vec<EntityId>,
    }

    impl PullHooks for Seen {
        fn fetched(&mut self, result: &FetchResult) {
            self.refs_fetched += result.refs_updated.len();
        }

        fn identity_merged(&mut self, _result: &MergeResult<Identity>) {
            self.identities += 1;
        }

        fn bug_merged(&mut self, result: &MergeResult<Bug>) {
            self.bugs.push(result.id);
        }
    }

    // ---- fetch / push ----

    #[test]
    fn push_then_fetch() {
        let (origin, a, b) = replicas();
        let bug = new_bug(&a);

        let pushed = push(&a, "origin").unwrap();
        assert_eq!(pushed.refs_updated.len(), 1);
        assert!(pushed.objects_sent >= 3);
        assert!(origin.ref_exists(&bug.local_ref()).unwrap());
        assert!(a
            .ref_exists(&Namespace::BUGS.remote_ref("origin", &bug.id().to_hex()))
            .unwrap());

        let fetched = fetch(&b, "origin").unwrap();
        assert_eq!(fetched.objects_received, pushed.objects_sent);
        assert_eq!(fetched.refs_updated[0].old, None);
        assert!(Bug::read_remote(&b, "origin", bug.id()).is_ok());
        // nothing local until merged
        assert!(Bug::read_local(&b, bug.id()).is_err());

        let again = fetch(&b, "origin").unwrap();
        assert_eq!(again.objects_received, 0);
        assert!(again.refs_updated.is_empty());
    }

    #[test]
    fn pull_with_reports_every_result() {
        let (_origin, a, b) = replicas();
        let one = new_bug(&a);
        let two = new_bug(&a);
        push(&a, "origin").unwrap();

        let mut seen = Seen::default();
        let pulled = pull_with(&b, "origin", &mut seen).unwrap();
        assert_eq!(seen.refs_fetched, 2);
        assert_eq!(seen.identities, 0);
        let mut expected = vec![one.id(), two.id()];
        expected.sort();
        seen.bugs.sort();
        assert_eq!(seen.bugs, expected);
        assert_eq!(pulled.bugs.new.len(), 2);

        let mut again = Seen::default();
        let quiet = pull_with(&b, "origin", &mut again).unwrap();
        assert_eq!(again.refs_fetched, 0);
        assert_eq!(again.bugs.len(), 2);
        assert_eq!(quiet.bugs.unchanged, 2);
    }

    #[test]
    fn unknown_remote() {
        let repo = Repository::in_memory();
        assert!(fetch(&repo, "nowhere").is_err());
        assert!(push(&repo, "nowhere").is_err());
    }

    #[test]
    fn diverged_push_is_rejected() {
        let (origin, a, b) = replicas();
        let bug = new_bug(&a);
        push(&a, "origin").unwrap();
        pull(&b, "origin").unwrap();

        comment_burst(&a, bug.id(), ann(), "a");
        comment_burst(&b, bug.id(), bob(), "b");
        assert!(push(&a, "origin").unwrap().rejected.is_empty());

        let rejected = push(&b, "origin").unwrap();
        assert_eq!(rejected.rejected.len(), 1);
        assert_eq!(rejected.rejected[0].reason, "non-fast-forward");
        assert_eq!(
            origin.resolve_ref(&bug.local_ref()).unwrap(),
            a.resolve_ref(&bug.local_ref()).unwrap()
        );
        assert!(rejected.into_result().is_err());
    }

    // ---- pull ----

    #[test]
    fn three_replica_convergence() {
        let (_origin, a, b) = replicas();
        let id = new_bug(&a).id();
        push(&a, "origin").unwrap();

        let first = pull(&b, "origin").unwrap();
        assert_eq!(first.bugs.new, vec![id]);
        assert_eq!(Bug::read_local(&b, id).unwrap().op_count(), 1);

        comment_burst(&a, id, ann(), "a");
        assert_eq!(Bug::read_local(&a, id).unwrap().op_count(), 10);
        comment_burst(&b, id, bob(), "b");
        assert_eq!(Bug::read_local(&b, id).unwrap().op_count(), 10);

        push(&a, "origin").unwrap().into_result().unwrap();
        let second = pull(&b, "origin").unwrap().into_result().unwrap();
        assert_eq!(second.bugs.updated, vec![id]);
        assert_eq!(Bug::read_local(&b, id).unwrap().op_count(), 19);

        push(&b, "origin").unwrap().into_result().unwrap();
        let third = pull(&a, "origin").unwrap().into_result().unwrap();
        assert_eq!(third.bugs.updated, vec![id]);
        assert_eq!(Bug::read_local(&a, id).unwrap().op_count(), 19);

        assert_eq!(op_ids(&a, id), op_ids(&b, id));
        assert_eq!(
            Bug::read_local(&a, id).unwrap().compile(),
            Bug::read_local(&b, id).unwrap().compile()
        );

        let quiet = pull(&a, "origin").unwrap();
        assert!(quiet.bugs.updated.is_empty());
        assert_eq!(quiet.bugs.unchanged, 1);
    }

    #[test]
    fn identities_and_configs_travel() {
        let (_origin, a, b) = replicas();
        let mut ident = Identity::create("Ann", "ann@example.com", "", T0).unwrap();
        ident.commit(&a).unwrap();
        set_config(&a, "labels", br#"{"labels":[]}"#).unwrap();
        push(&a, "origin").unwrap();

        let pulled = pull(&b, "origin").unwrap();
        assert_eq!(pulled.identities.new, vec![ident.id()]);
        assert_eq!(
            pulled.configs,
            vec![ConfigUpdate::New {
                name: "labels".into()
            }]
        );
        assert_eq!(
            get_config(&b, "labels").unwrap().unwrap(),
            br#"{"labels":[]}"#.to_vec()
        );
        assert_eq!(
            Identity::read_local(&b, ident.id()).unwrap().snapshot().name,
            "Ann"
        );
    }

    #[test]
    fn broken_remote_entity_is_reported_after_the_rest() {
        let (origin, a, b) = replicas();
        let good = new_bug(&a);
        push(&a, "origin").unwrap();

        // a ref whose name does not match the entity behind it
        let stray = new_bug(&origin);
        let bogus = EntityId::from_hash([9; 32]);
        origin
            .copy_ref(&stray.local_ref(), &Namespace::BUGS.local_ref(&bogus.to_hex()))
            .unwrap();
        origin.remove_ref(&stray.local_ref()).unwrap();

        let pulled = pull(&b, "origin").unwrap();
        assert_eq!(pulled.bugs.new, vec![good.id()]);
        assert_eq!(pulled.failures.len(), 1);
        assert!(pulled.failures[0].starts_with(&format!(
            "merge failure for ticket {}: ",
            bogus.human()
        )));
        assert!(pulled.into_result().is_err());
    }

    // ---- removal ----

    #[test]
    fn removal_reaches_other_replicas() {
        let (origin, a, b) = replicas();
        let bug = new_bug(&a);
        push(&a, "origin").unwrap();
        pull(&b, "origin").unwrap();
        assert!(Bug::read_local(&b, bug.id()).is_ok());

        Bug::remove(&a, bug.id()).unwrap();
        assert!(push_removal(&a, "origin", Namespace::BUGS, &bug.id().to_hex()).unwrap());
        assert!(!origin.ref_exists(&bug.local_ref()).unwrap());

        let fetched = fetch(&b, "origin").unwrap();
        assert_eq!(fetched.refs_pruned.len(), 1);
        assert_eq!(fetched.refs_removed, vec![bug.local_ref()]);
        assert!(Bug::read_local(&b, bug.id()).is_err());

        assert!(!push_removal(&a, "origin", Namespace::BUGS, &bug.id().to_hex()).unwrap());
    }

    #[test]
    fn removal_keeps_unpushed_local_work() {
        let (_origin, a, b) = replicas();
        let bug = new_bug(&a);
        push(&a, "origin").unwrap();
        pull(&b, "origin").unwrap();

        let mut local = Bug::read_local(&b, bug.id()).unwrap();
        edits::add_comment(&mut local, bob(), T0 + 5, "still needed", vec![]).unwrap();
        local.commit(&b).unwrap();

        push_removal(&a, "origin", Namespace::BUGS, &bug.id().to_hex()).unwrap();
        let fetched = fetch(&b, "origin").unwrap();
        assert_eq!(fetched.refs_pruned.len(), 1);
        assert!(fetched.refs_removed.is_empty());
        assert_eq!(Bug::read_local(&b, bug.id()).unwrap().op_count(), 2);
    }
}
