//! A loaded identity behind the cache.

use std::sync::{Arc, RwLock};

use tix_entity::{Identity, IdentityAction, IdentitySnapshot};
use tix_types::{unix_now, EntityId};

use crate::error::CacheResult;
use crate::excerpt::IdentityExcerpt;
use crate::state::{read, write, CacheState};

pub struct IdentityCache {
    id: EntityId,
    state: Arc<CacheState>,
    identity: RwLock<Identity>,
}

impl IdentityCache {
    pub(crate) fn new(state: Arc<CacheState>, identity: Identity) -> Self {
        Self {
            id: identity.id(),
            state,
            identity: RwLock::new(identity),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        read(&self.identity).snapshot()
    }

    pub fn need_commit(&self) -> bool {
        read(&self.identity).need_commit()
    }

    /// Stage an edit authored by this identity.
    pub fn edit(&self, action: IdentityAction) -> CacheResult<()> {
        let mut identity = write(&self.identity);
        identity.edit(unix_now(), action)?;
        self.state.identity_updated(&identity)
    }

    pub fn set_name(&self, name: &str) -> CacheResult<()> {
        self.edit(IdentityAction::SetName {
            name: name.to_string(),
        })
    }

    pub fn set_email(&self, email: &str) -> CacheResult<()> {
        self.edit(IdentityAction::SetEmail {
            email: email.to_string(),
        })
    }

    /// Swap in merged history, keeping staged edits.
    pub(crate) fn reload(&self, merged: &Identity) -> IdentityExcerpt {
        let mut identity = write(&self.identity);
        identity.reload(merged.clone());
        IdentityExcerpt::new(&identity)
    }

    pub fn commit(&self) -> CacheResult<()> {
        let mut identity = write(&self.identity);
        identity.commit_as_needed(&self.state.repo)?;
        self.state.identity_updated(&identity)
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("id", &self.id.human())
            .finish()
    }
}
