//! Identities: who authors operations.
//!
//! An identity is an operation log like a ticket, stored under
//! `refs/identities/<id>`, and merges the same way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tix_crypto::VerifyingKey;
use tix_repo::Namespace;
use tix_types::EntityId;

use crate::entity::Entity;
use crate::error::{EntityError, EntityResult};
use crate::operation::{is_printable, is_single_line, Action, Operation};

pub type Identity = Entity<IdentityAction>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityAction {
    Create {
        name: String,
        #[serde(default)]
        email: String,
        /// Login on an external system, if any.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        login: String,
    },
    SetName {
        name: String,
    },
    SetEmail {
        email: String,
    },
    AddKey {
        public_key: VerifyingKey,
    },
    SetMetadata {
        target: EntityId,
        new_metadata: BTreeMap<String, String>,
    },
}

fn validate_field(field: &str, value: &str) -> EntityResult<()> {
    if !is_single_line(value) {
        return Err(EntityError::validation(format!("{field} should be a single line")));
    }
    if !is_printable(value) {
        return Err(EntityError::validation(format!("{field} is not fully printable")));
    }
    Ok(())
}

fn validate_name(name: &str) -> EntityResult<()> {
    if name.trim().is_empty() {
        return Err(EntityError::validation("name is empty"));
    }
    validate_field("name", name)
}

impl Action for IdentityAction {
    const NAMESPACE: Namespace = Namespace::IDENTITIES;
    const TYPENAME: &'static str = "identity";

    fn is_create(&self) -> bool {
        matches!(self, Self::Create { .. })
    }

    fn validate(&self) -> EntityResult<()> {
        match self {
            Self::Create { name, email, login } => {
                validate_name(name)?;
                validate_field("email", email)?;
                validate_field("login", login)
            }
            Self::SetName { name } => validate_name(name),
            Self::SetEmail { email } => validate_field("email", email),
            Self::AddKey { .. } => Ok(()),
            Self::SetMetadata { target, .. } => {
                if target.is_unset() {
                    return Err(EntityError::validation("target hash is invalid"));
                }
                Ok(())
            }
        }
    }

    fn requires_author() -> bool {
        false
    }
}

/// The current state of an identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub login: String,
    pub keys: Vec<VerifyingKey>,
    pub metadata: BTreeMap<String, String>,
}

impl IdentitySnapshot {
    /// `name <email>`, or just the name without an email.
    pub fn display_name(&self) -> String {
        if self.email.is_empty() {
            self.name.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

impl Identity {
    /// A new identity, staged and not yet committed.
    pub fn create(name: &str, email: &str, login: &str, unix_time: i64) -> EntityResult<Self> {
        let op = Operation::new(
            EntityId::unset(),
            unix_time,
            IdentityAction::Create {
                name: name.to_string(),
                email: email.to_string(),
                login: login.to_string(),
            },
        );
        op.validate()?;
        let mut identity = Self::new();
        identity.append(op);
        Ok(identity)
    }

    /// Stage an edit authored by the identity itself.
    pub fn edit(&mut self, unix_time: i64, action: IdentityAction) -> EntityResult<()> {
        let op = Operation::new(self.id(), unix_time, action);
        op.validate()?;
        self.append(op);
        Ok(())
    }

    pub fn snapshot(&self) -> IdentitySnapshot {
        let mut snap = IdentitySnapshot {
            id: self.id(),
            ..Default::default()
        };
        let create_id = snap.id;
        for op in self.operations() {
            match op.action() {
                IdentityAction::Create { name, email, login } => {
                    snap.name = name.clone();
                    snap.email = email.clone();
                    snap.login = login.clone();
                }
                IdentityAction::SetName { name } => snap.name = name.clone(),
                IdentityAction::SetEmail { email } => snap.email = email.clone(),
                IdentityAction::AddKey { public_key } => {
                    if !snap.keys.contains(public_key) {
                        snap.keys.push(public_key.clone());
                    }
                }
                IdentityAction::SetMetadata {
                    target,
                    new_metadata,
                } if *target == create_id => {
                    for (key, value) in new_metadata {
                        snap.metadata.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }
                IdentityAction::SetMetadata { .. } => {}
            }
        }
        if let Some(first) = self.first_op() {
            for (key, value) in first.metadata() {
                snap.metadata.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        snap
    }
}
