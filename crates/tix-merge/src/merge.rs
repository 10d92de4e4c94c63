//! Per-entity merge and the streaming driver over a remote's tracking refs.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tix_entity::{Action, Entity, EntityResult};
use tix_repo::{Namespace, Repository};
use tix_types::EntityId;
use tracing::{debug, info, warn};

use crate::error::MergeError;

/// Results buffered between the producer thread and the consumer.
const QUEUE_DEPTH: usize = 16;

/// An entity family that can be merged from remote-tracking refs.
pub trait Mergeable: Sized + Send + 'static {
    const NAMESPACE: Namespace;

    fn id(&self) -> EntityId;

    /// Load and validate the entity behind `ref_name`.
    fn read_ref(repo: &Repository, ref_name: &str) -> EntityResult<Self>;

    /// Integrate `other` into `self`; `false` when nothing changed.
    fn merge_from(&mut self, repo: &Repository, other: &Self) -> EntityResult<bool>;
}

impl<A: Action> Mergeable for Entity<A> {
    const NAMESPACE: Namespace = A::NAMESPACE;

    fn id(&self) -> EntityId {
        Entity::id(self)
    }

    fn read_ref(repo: &Repository, ref_name: &str) -> EntityResult<Self> {
        Entity::read(repo, ref_name)
    }

    fn merge_from(&mut self, repo: &Repository, other: &Self) -> EntityResult<bool> {
        self.merge(repo, other)
    }
}

/// What merging one remote ref did.
#[derive(Debug)]
pub enum MergeOutcome<E> {
    /// The entity did not exist locally and was copied.
    New(E),
    /// The local history was fast-forwarded or rebased.
    Updated(E),
    /// The remote brought nothing new.
    Nothing,
    /// The remote entity is broken and was skipped.
    Invalid { reason: String },
}

impl<E> MergeOutcome<E> {
    pub fn entity(&self) -> Option<&E> {
        match self {
            Self::New(e) | Self::Updated(e) => Some(e),
            Self::Nothing | Self::Invalid { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::New(_) => "new",
            Self::Updated(_) => "updated",
            Self::Nothing => "nothing",
            Self::Invalid { .. } => "invalid",
        }
    }
}

#[derive(Debug)]
pub struct MergeResult<E> {
    /// Unset when the failure happened before any entity was identified.
    pub id: EntityId,
    pub outcome: Result<MergeOutcome<E>, MergeError>,
}

impl<E> MergeResult<E> {
    /// The failure reason for errors and invalid entities.
    pub fn failure(&self) -> Option<String> {
        match &self.outcome {
            Err(e) => Some(e.to_string()),
            Ok(MergeOutcome::Invalid { reason }) => Some(reason.clone()),
            Ok(_) => None,
        }
    }
}

/// Merge the tracking ref `remote_ref` into the matching local ref.
pub fn merge_ref<E: Mergeable>(repo: &Repository, remote_ref: &str) -> MergeResult<E> {
    let ns = E::NAMESPACE;
    let Some(suffix) = ns.suffix(remote_ref) else {
        return MergeResult {
            id: EntityId::unset(),
            outcome: Ok(MergeOutcome::Invalid {
                reason: format!("{remote_ref} is not a {} ref", ns.family()),
            }),
        };
    };
    let id = match EntityId::from_hex(suffix) {
        Ok(id) => id,
        Err(e) => {
            return MergeResult {
                id: EntityId::unset(),
                outcome: Ok(MergeOutcome::Invalid {
                    reason: format!("invalid ref id {suffix}: {e}"),
                }),
            }
        }
    };
    let outcome = merge_existing::<E>(repo, remote_ref, &ns.local_ref(suffix));
    MergeResult { id, outcome }
}

fn merge_existing<E: Mergeable>(
    repo: &Repository,
    remote_ref: &str,
    local_ref: &str,
) -> Result<MergeOutcome<E>, MergeError> {
    let remote_head = repo.resolve_ref(remote_ref)?;
    let local_head = if repo.ref_exists(local_ref)? {
        Some(repo.resolve_ref(local_ref)?)
    } else {
        None
    };
    if let Some(local_head) = &local_head {
        if repo.commits_between(Some(local_head), &remote_head)?.is_empty() {
            return Ok(MergeOutcome::Nothing);
        }
    }

    let remote = match E::read_ref(repo, remote_ref) {
        Ok(remote) => remote,
        Err(e) => return Ok(MergeOutcome::Invalid { reason: e.to_string() }),
    };

    if local_head.is_none() {
        repo.copy_ref(remote_ref, local_ref)?;
        return Ok(MergeOutcome::New(remote));
    }
    let mut local = E::read_ref(repo, local_ref)?;
    if local.merge_from(repo, &remote)? {
        Ok(MergeOutcome::Updated(local))
    } else {
        Ok(MergeOutcome::Nothing)
    }
}

/// A stream of merge results produced on a dedicated thread.
///
/// Dropping the stream drains whatever is left and joins the producer, so
/// every remote ref is processed even if the consumer stops early.
pub struct MergeStream<E> {
    rx: Option<Receiver<MergeResult<E>>>,
    producer: Option<JoinHandle<()>>,
}

impl<E> Iterator for MergeStream<E> {
    type Item = MergeResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl<E> Drop for MergeStream<E> {
    fn drop(&mut self) {
        if let Some(rx) = self.rx.take() {
            for _ in rx.iter() {}
        }
        if let Some(producer) = self.producer.take() {
            if producer.join().is_err() {
                warn!("merge producer panicked");
            }
        }
    }
}

/// Merge every tracking ref of `remote` for the entity family `E`.
pub fn merge_all<E: Mergeable>(
    repo: Arc<Repository>,
    remote: &str,
) -> Result<MergeStream<E>, MergeError> {
    let (tx, rx) = sync_channel(QUEUE_DEPTH);
    let remote = remote.to_string();
    let producer = thread::Builder::new()
        .name(format!("merge-{}", E::NAMESPACE.family()))
        .spawn(move || produce::<E>(&repo, &remote, tx))?;
    Ok(MergeStream {
        rx: Some(rx),
        producer: Some(producer),
    })
}

fn produce<E: Mergeable>(repo: &Repository, remote: &str, tx: SyncSender<MergeResult<E>>) {
    let ns = E::NAMESPACE;
    let refs = match repo.list_refs(&ns.remote_prefix(remote)) {
        Ok(refs) => refs,
        Err(e) => {
            let _ = tx.send(MergeResult {
                id: EntityId::unset(),
                outcome: Err(e.into()),
            });
            return;
        }
    };
    info!(remote, family = ns.family(), refs = refs.len(), "merge started");

    for remote_ref in refs {
        let result = merge_ref::<E>(repo, &remote_ref);
        match &result.outcome {
            Ok(MergeOutcome::Invalid { reason }) => {
                warn!(remote_ref = %remote_ref, reason = %reason, "skipping invalid entity")
            }
            Ok(outcome) => debug!(id = %result.id.human(), outcome = outcome.label(), "merged"),
            Err(e) => warn!(remote_ref = %remote_ref, error = %e, "merge failed"),
        }
        if tx.send(result).is_err() {
            // receiver gone; nothing left to report to
            return;
        }
    }
    info!(remote, family = ns.family(), "merge finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tix_entity::{edits, Bug, Identity};

    const T0: i64 = 1_700_000_000;

    fn ann() -> EntityId {
        EntityId::from_hash([1; 32])
    }

    fn committed_bug(repo: &Repository) -> Bug {
        let mut bug = edits::create(ann(), T0, "crash", "it crashes", vec![]).unwrap();
        bug.commit(repo).unwrap();
        bug
    }

    fn comment(repo: &Repository, bug: &mut Bug, message: &str) {
        edits::add_comment(bug, ann(), T0 + 1, message, vec![]).unwrap();
        bug.commit(repo).unwrap();
    }

    /// Point the origin tracking ref of `bug` at its current head.
    fn track(repo: &Repository, bug: &Bug) {
        let name = Namespace::BUGS.remote_ref("origin", &bug.id().to_hex());
        repo.update_ref(&name, bug.last_commit().unwrap()).unwrap();
    }

    fn run(repo: &Arc<Repository>) -> Vec<MergeResult<Bug>> {
        merge_all::<Bug>(Arc::clone(repo), "origin").unwrap().collect()
    }

    #[test]
    fn new_then_nothing() {
        let repo = Arc::new(Repository::in_memory());
        let bug = committed_bug(&repo);
        track(&repo, &bug);
        repo.remove_ref(&bug.local_ref()).unwrap();

        let results = run(&repo);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, bug.id());
        assert!(matches!(results[0].outcome, Ok(MergeOutcome::New(_))));
        assert!(Bug::read_local(&repo, bug.id()).is_ok());

        let again = run(&repo);
        assert!(matches!(again[0].outcome, Ok(MergeOutcome::Nothing)));
    }

    #[test]
    fn fast_forward() {
        let repo = Arc::new(Repository::in_memory());
        let mut bug = committed_bug(&repo);
        let old_head = bug.last_commit().unwrap();
        comment(&repo, &mut bug, "newer");
        track(&repo, &bug);
        repo.update_ref(&bug.local_ref(), old_head).unwrap();

        let results = run(&repo);
        match &results[0].outcome {
            Ok(MergeOutcome::Updated(merged)) => assert_eq!(merged.op_count(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(repo.resolve_ref(&bug.local_ref()).unwrap(), bug.last_commit().unwrap());
        assert!(matches!(run(&repo)[0].outcome, Ok(MergeOutcome::Nothing)));
    }

    #[test]
    fn local_ahead_is_nothing() {
        let repo = Arc::new(Repository::in_memory());
        let mut bug = committed_bug(&repo);
        track(&repo, &bug);
        comment(&repo, &mut bug, "local");
        assert!(matches!(run(&repo)[0].outcome, Ok(MergeOutcome::Nothing)));
        assert_eq!(Bug::read_local(&repo, bug.id()).unwrap().op_count(), 2);
    }

    #[test]
    fn concurrent_edits_are_rebased() {
        let repo = Arc::new(Repository::in_memory());
        let base = committed_bug(&repo);

        let mut theirs = base.clone();
        for m in ["t1", "t2", "t3"] {
            comment(&repo, &mut theirs, m);
        }
        track(&repo, &theirs);

        let mut ours = base.clone();
        comment(&repo, &mut ours, "o1");
        comment(&repo, &mut ours, "o2");

        let results = run(&repo);
        match &results[0].outcome {
            Ok(MergeOutcome::Updated(merged)) => assert_eq!(merged.op_count(), 1 + 3 + 2),
            other => panic!("unexpected {other:?}"),
        }
        let merged = Bug::read_local(&repo, base.id()).unwrap();
        let messages: Vec<_> = merged.compile().comments[1..]
            .iter()
            .map(|c| c.message.clone())
            .collect();
        assert_eq!(messages, vec!["t1", "t2", "t3", "o1", "o2"]);
        assert!(matches!(run(&repo)[0].outcome, Ok(MergeOutcome::Nothing)));
    }

    #[test]
    fn invalid_refs_do_not_stop_the_batch() {
        let repo = Arc::new(Repository::in_memory());
        let good = committed_bug(&repo);
        let other = committed_bug(&repo);
        track(&repo, &good);
        repo.remove_ref(&good.local_ref()).unwrap();
        // ref name that is not an id
        repo.update_ref(
            &Namespace::BUGS.remote_ref("origin", "not-an-id"),
            good.last_commit().unwrap(),
        )
        .unwrap();
        // ref whose content belongs to another entity
        let mislabeled = Namespace::BUGS.remote_ref("origin", &EntityId::from_hash([9; 32]).to_hex());
        repo.update_ref(&mislabeled, other.last_commit().unwrap()).unwrap();

        let results = run(&repo);
        assert_eq!(results.len(), 3);
        let invalid = results
            .iter()
            .filter(|r| matches!(r.outcome, Ok(MergeOutcome::Invalid { .. })))
            .count();
        assert_eq!(invalid, 2);
        assert!(results.iter().any(|r| r.id == good.id() && r.failure().is_none()));
    }

    #[test]
    fn dropping_the_stream_finishes_the_work() {
        let repo = Arc::new(Repository::in_memory());
        let mut ids = Vec::new();
        for _ in 0..(QUEUE_DEPTH + 4) {
            let bug = committed_bug(&repo);
            track(&repo, &bug);
            repo.remove_ref(&bug.local_ref()).unwrap();
            ids.push(bug.id());
        }
        let mut stream = merge_all::<Bug>(Arc::clone(&repo), "origin").unwrap();
        assert!(stream.next().is_some());
        drop(stream);

        let mut local = Bug::list_local_ids(&repo).unwrap();
        local.sort();
        ids.sort();
        assert_eq!(local, ids);
    }

    #[test]
    fn identities_merge_too() {
        let repo = Arc::new(Repository::in_memory());
        let mut identity = Identity::create("Ann", "ann@example.com", "", T0).unwrap();
        identity.commit(&repo).unwrap();
        let name = Namespace::IDENTITIES.remote_ref("origin", &identity.id().to_hex());
        repo.update_ref(&name, identity.last_commit().unwrap()).unwrap();
        repo.remove_ref(&identity.local_ref()).unwrap();

        let results: Vec<_> = merge_all::<Identity>(Arc::clone(&repo), "origin")
            .unwrap()
            .collect();
        match &results[0].outcome {
            Ok(MergeOutcome::New(merged)) => assert_eq!(merged.snapshot().name, "Ann"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
