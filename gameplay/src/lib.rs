//! Networked entities for roomsync: identity, spawning, commands and state sync.
//!
//! This crate sits on top of [`session::Session`] and a host-provided
//! [`EntityWorld`]. The host is authoritative for the entity set: it spawns,
//! despawns and reassigns ownership, and every other peer replays what the
//! host broadcasts. Continuous state flows the other way too, from whichever
//! peer holds authority over an entity.
//!
//! # Features
//!
//! - Network id registry with duplicate detection
//! - Host-authoritative spawn, despawn and ownership replication
//! - Late-join replay and owner cleanup
//! - Host-directed commands with pluggable handlers
//! - Transform sync with thresholds and interpolation
//! - 2D rigidbody sync with extrapolation, reconciliation and client-side prediction
//!
//! # Design Principles
//!
//! - **Host decides** - Structural changes only originate on the host.
//! - **Engine-agnostic** - Entities are opaque handles behind [`EntityWorld`].
//! - **Deterministic** - Sync ticks walk entities in network-id order.

mod allocator;
mod authority;
mod catalog;
mod command;
mod identity;
mod registry;
mod rigidbody_sync;
mod runtime;
mod spawner;
mod sync_set;
mod transform_sync;
mod world;

#[cfg(test)]
mod testing;

pub use allocator::NetworkIdAllocator;
pub use authority::{Authority, LocalPeer};
pub use catalog::{CatalogError, PrefabCatalog, PrefabEntry, PrefabId, PrefabSpec};
pub use command::{
    CommandContext, CommandDelivery, CommandError, CommandHandler, CommandRequest, CommandRouter,
    HandlerId,
};
pub use identity::{EntityHandle, IdentityKind, NetworkIdentity};
pub use registry::{NetworkRegistry, RegistryError};
pub use rigidbody_sync::{
    damp_to_lerp, BodySample, Rigidbody2DSync, RigidbodySyncSettings, SampleOutcome,
};
pub use runtime::{Gameplay, GameplayMessageHandler};
pub use spawner::{
    NetworkSpawner, SceneAccess, SpawnError, SpawnRecord, SpawnRequest, SpawnerConfig,
};
pub use sync_set::SyncSet;
pub use transform_sync::{smoothing_factor, TransformSync, TransformSyncSettings};
pub use world::{Body2D, BodyKind, EntityWorld, Pose};
