//! Network id to identity lookup.

use std::collections::HashMap;

use log::error;
use thiserror::Error;
use wire::NetworkId;

use crate::identity::NetworkIdentity;

/// Registry failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("network id {id} is not positive")]
    InvalidId { id: NetworkId },

    #[error("duplicate network id {id}: bound to entity {existing}, rejected entity {rejected}")]
    DuplicateId {
        id: NetworkId,
        existing: u64,
        rejected: u64,
    },
}

/// Maps network ids to the identities currently bound to them.
///
/// First registrant wins: a later registration of the same id with a
/// different identity is rejected and the caller must treat itself as
/// unregistered.
#[derive(Debug, Default)]
pub struct NetworkRegistry {
    by_id: HashMap<NetworkId, NetworkIdentity>,
}

impl NetworkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, identity: NetworkIdentity) -> Result<(), RegistryError> {
        if !identity.id.is_valid() {
            return Err(RegistryError::InvalidId { id: identity.id });
        }
        if let Some(existing) = self.by_id.get(&identity.id) {
            if *existing == identity {
                return Ok(());
            }
            let err = RegistryError::DuplicateId {
                id: identity.id,
                existing: existing.entity.raw(),
                rejected: identity.entity.raw(),
            };
            error!("{err}");
            return Err(err);
        }
        self.by_id.insert(identity.id, identity);
        Ok(())
    }

    /// Removes `identity` only if it is the one bound to its id.
    pub fn unregister(&mut self, identity: &NetworkIdentity) -> bool {
        match self.by_id.get(&identity.id) {
            Some(existing) if existing == identity => {
                self.by_id.remove(&identity.id);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn lookup(&self, id: NetworkId) -> Option<NetworkIdentity> {
        self.by_id.get(&id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: NetworkId) -> bool {
        self.by_id.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkIdentity> {
        self.by_id.values()
    }
}
