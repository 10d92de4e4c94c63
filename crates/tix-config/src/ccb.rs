use serde::{Deserialize, Serialize};
use tix_types::EntityId;

use crate::error::ConfigResult;

/// Identities allowed to sit on a ticket's change control board.
///
/// Stored as `{"ccbMembers": ["<identity id>", ...]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcbConfig {
    #[serde(rename = "ccbMembers")]
    pub members: Vec<EntityId>,
}

impl CcbConfig {
    pub fn parse(data: &[u8]) -> ConfigResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn is_member(&self, id: &EntityId) -> bool {
        self.members.contains(id)
    }
}
