//! Network identities.

use wire::NetworkId;

/// Opaque handle to an entity in the embedding application's world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub u64);

impl EntityHandle {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// How an identity got its network id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IdentityKind {
    /// Authored into the level with a fixed id shared by every peer.
    #[default]
    SceneStatic,
    /// Created at runtime by the spawner with an allocated id.
    Spawned,
}

/// Binds a local entity to the id that names it on every peer.
///
/// Identities compare by value: two identities are the same registrant only
/// if id, kind and entity all match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkIdentity {
    pub id: NetworkId,
    pub kind: IdentityKind,
    pub entity: EntityHandle,
}

impl NetworkIdentity {
    #[must_use]
    pub const fn new(id: NetworkId, kind: IdentityKind, entity: EntityHandle) -> Self {
        Self { id, kind, entity }
    }

    #[must_use]
    pub const fn scene(id: NetworkId, entity: EntityHandle) -> Self {
        Self::new(id, IdentityKind::SceneStatic, entity)
    }

    #[must_use]
    pub const fn spawned(id: NetworkId, entity: EntityHandle) -> Self {
        Self::new(id, IdentityKind::Spawned, entity)
    }
}
