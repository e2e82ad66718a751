//! Host-authoritative spawn, despawn and ownership replication.
//!
//! Only the current host creates, destroys or reassigns networked entities
//! for the whole room. It applies each change locally, then broadcasts it;
//! every other peer replays the broadcast when it comes from the host.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use log::{debug, error, info, warn};
use session::{NetworkMessage, PlayerId, PlayerInfo, SendOptions, Session};
use thiserror::Error;
use wire::ids::gameplay_ids;
use wire::{
    decode_despawn, decode_ownership, decode_spawn, encode_despawn, encode_ownership,
    encode_spawn, EncodeError, Limits, NetworkId, OwnershipMessage, SpawnMessage,
};

use crate::allocator::NetworkIdAllocator;
use crate::authority::Authority;
use crate::catalog::{PrefabCatalog, PrefabId};
use crate::identity::NetworkIdentity;
use crate::registry::{NetworkRegistry, RegistryError};
use crate::sync_set::SyncSet;
use crate::world::{EntityWorld, Pose};

/// Spawner behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpawnerConfig {
    /// Replay live spawns to players who join late.
    pub sync_existing_to_new_players: bool,
    /// Despawn a departing player's entities.
    pub despawn_owned_on_player_left: bool,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            sync_existing_to_new_players: true,
            despawn_owned_on_player_left: true,
        }
    }
}

/// Mutable access to the scene a spawner operates on.
pub struct SceneAccess<'a> {
    pub registry: &'a mut NetworkRegistry,
    pub syncs: &'a mut SyncSet,
    pub world: &'a mut dyn EntityWorld,
}

/// A live spawned entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRecord {
    pub prefab_id: PrefabId,
    pub authority: Authority,
    pub custom_payload: Vec<u8>,
    pub identity: NetworkIdentity,
}

/// Arguments to [`NetworkSpawner::spawn_for_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub prefab_id: PrefabId,
    pub position: Vec3,
    pub rotation: Quat,
    pub authority: Authority,
    pub custom_payload: Vec<u8>,
}

impl SpawnRequest {
    #[must_use]
    pub fn new(prefab_id: impl Into<PrefabId>, position: Vec3) -> Self {
        Self {
            prefab_id: prefab_id.into(),
            position,
            rotation: Quat::IDENTITY,
            authority: Authority::host(),
            custom_payload: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = authority;
        self
    }

    #[must_use]
    pub fn with_custom_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.custom_payload = payload.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("not in a room")]
    NotInRoom,
    #[error("only host can {action}")]
    NotHost { action: &'static str },
    #[error("{id} is not a valid prefab id")]
    InvalidPrefab { id: PrefabId },
    #[error("{id} not found in catalog")]
    UnknownPrefab { id: PrefabId },
    #[error("world failed to instantiate {id}")]
    InstantiateFailed { id: PrefabId },
    #[error("network id {id} is not positive")]
    InvalidNetworkId { id: NetworkId },
    #[error("no spawned entity with network id {id}")]
    NotFound { id: NetworkId },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Spawns, despawns and reassigns networked entities.
#[derive(Debug, Default)]
pub struct NetworkSpawner {
    catalog: PrefabCatalog,
    config: SpawnerConfig,
    limits: Limits,
    allocator: NetworkIdAllocator,
    records: BTreeMap<NetworkId, SpawnRecord>,
}

impl NetworkSpawner {
    #[must_use]
    pub fn new(catalog: PrefabCatalog, config: SpawnerConfig) -> Self {
        Self {
            catalog,
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn catalog(&self) -> &PrefabCatalog {
        &self.catalog
    }

    pub fn set_catalog(&mut self, catalog: PrefabCatalog) {
        self.catalog = catalog;
    }

    #[must_use]
    pub const fn config(&self) -> SpawnerConfig {
        self.config
    }

    pub fn set_config(&mut self, config: SpawnerConfig) {
        self.config = config;
    }

    #[must_use]
    pub fn spawn_count(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn record(&self, id: NetworkId) -> Option<&SpawnRecord> {
        self.records.get(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &SpawnRecord> {
        self.records.values()
    }

    /// First live spawn of `prefab`, in network-id order.
    #[must_use]
    pub fn find_first_by_prefab(&self, prefab: PrefabId) -> Option<NetworkIdentity> {
        if !prefab.is_valid() {
            return None;
        }
        self.records
            .values()
            .find(|record| record.prefab_id == prefab)
            .map(|record| record.identity)
    }

    /// First live spawn of `prefab` owned by `owner`, in network-id order.
    #[must_use]
    pub fn find_first_by_owner(&self, owner: &PlayerId, prefab: PrefabId) -> Option<NetworkIdentity> {
        if !prefab.is_valid() || owner.is_empty() {
            return None;
        }
        self.records
            .values()
            .find(|record| record.prefab_id == prefab && record.authority.owner == *owner)
            .map(|record| record.identity)
    }

    /// Host only: spawns locally and broadcasts the spawn to the room.
    pub fn spawn_for_all(
        &mut self,
        session: &mut Session,
        scene: &mut SceneAccess<'_>,
        request: SpawnRequest,
    ) -> Result<NetworkIdentity, SpawnError> {
        require_host(session, "spawn objects")?;
        let prefab = request.prefab_id;
        if !prefab.is_valid() {
            error!("{prefab} is not a valid prefab id");
            return Err(SpawnError::InvalidPrefab { id: prefab });
        }
        if !self.catalog.contains(prefab) {
            error!("{prefab} not found in catalog");
            return Err(SpawnError::UnknownPrefab { id: prefab });
        }

        let registry = &*scene.registry;
        let records = &self.records;
        let id = self
            .allocator
            .allocate(|id| registry.contains(id) || records.contains_key(&id));

        let message = SpawnMessage {
            network_id: id,
            prefab_id: prefab.raw(),
            authority: request.authority.mode,
            owner_id: request.authority.owner.as_str().to_owned(),
            position: request.position,
            rotation: request.rotation,
            custom: request.custom_payload,
        };
        let payload = encode_spawn(&message, &self.limits)?;

        let identity = self.spawn_local(
            scene,
            id,
            prefab,
            Pose::new(message.position, message.rotation),
            request.authority,
            message.custom,
        )?;
        session.send(
            NetworkMessage::new(gameplay_ids::SPAWN, payload),
            &SendOptions::others(true),
        );
        info!("spawned {prefab} as {id}");
        Ok(identity)
    }

    /// Host only: despawns locally and broadcasts the despawn.
    ///
    /// An unknown id is reported as [`SpawnError::NotFound`] and nothing is
    /// sent, so repeating a despawn is harmless.
    pub fn despawn_for_all(
        &mut self,
        session: &mut Session,
        scene: &mut SceneAccess<'_>,
        id: NetworkId,
    ) -> Result<(), SpawnError> {
        if !id.is_valid() {
            return Err(SpawnError::InvalidNetworkId { id });
        }
        require_host(session, "despawn objects")?;
        if !self.despawn_local(scene, id) {
            return Err(SpawnError::NotFound { id });
        }
        session.send(
            NetworkMessage::new(gameplay_ids::DESPAWN, encode_despawn(id)),
            &SendOptions::others(true),
        );
        Ok(())
    }

    /// Host only: reassigns authority in place and broadcasts the change.
    pub fn set_ownership_for_all(
        &mut self,
        session: &mut Session,
        scene: &mut SceneAccess<'_>,
        id: NetworkId,
        authority: Authority,
    ) -> Result<(), SpawnError> {
        if !id.is_valid() {
            return Err(SpawnError::InvalidNetworkId { id });
        }
        require_host(session, "change ownership")?;
        if !self.records.contains_key(&id) {
            return Err(SpawnError::NotFound { id });
        }
        let payload = encode_ownership(
            &OwnershipMessage {
                network_id: id,
                authority: authority.mode,
                owner_id: authority.owner.as_str().to_owned(),
            },
            &self.limits,
        )?;
        self.apply_ownership_local(scene, id, authority);
        session.send(
            NetworkMessage::new(gameplay_ids::OWNERSHIP_CHANGED, payload),
            &SendOptions::others(true),
        );
        Ok(())
    }

    /// Host only: despawns every live spawn for everyone.
    pub fn despawn_all_for_all(
        &mut self,
        session: &mut Session,
        scene: &mut SceneAccess<'_>,
    ) -> Result<usize, SpawnError> {
        require_host(session, "despawn objects")?;
        let ids: Vec<NetworkId> = self.records.keys().copied().collect();
        let mut despawned = 0;
        for id in ids {
            if self.despawn_for_all(session, scene, id).is_ok() {
                despawned += 1;
            }
        }
        Ok(despawned)
    }

    /// Applies an inbound spawn, despawn or ownership message.
    ///
    /// Returns `false` for any other message id. Messages not sent by the
    /// current host are ignored.
    pub fn handle_message(
        &mut self,
        session: &Session,
        scene: &mut SceneAccess<'_>,
        message: &NetworkMessage,
    ) -> bool {
        match message.id {
            gameplay_ids::SPAWN => {
                if accepts_remote(session, message) {
                    self.handle_remote_spawn(scene, message);
                }
            }
            gameplay_ids::DESPAWN => {
                if accepts_remote(session, message) {
                    match decode_despawn(&message.payload) {
                        Ok(id) => {
                            self.despawn_local(scene, id);
                        }
                        Err(err) => warn!("invalid despawn payload: {err}"),
                    }
                }
            }
            gameplay_ids::OWNERSHIP_CHANGED => {
                if accepts_remote(session, message) {
                    match decode_ownership(&message.payload, &self.limits) {
                        Ok(change) => {
                            let authority = Authority::new(change.authority, PlayerId::new(change.owner_id));
                            self.apply_ownership_local(scene, change.network_id, authority);
                        }
                        Err(err) => warn!("invalid ownership payload: {err}"),
                    }
                }
            }
            _ => return false,
        }
        true
    }

    /// Host only: replays every live spawn to a player who just joined.
    ///
    /// Returns the number of spawn messages sent.
    pub fn on_player_joined(
        &mut self,
        session: &mut Session,
        scene: &SceneAccess<'_>,
        player: &PlayerInfo,
    ) -> usize {
        if !self.config.sync_existing_to_new_players || player.id.is_empty() {
            return 0;
        }
        if !session.is_in_room() || !session.is_host() {
            return 0;
        }
        if session.local_player_id() == Some(&player.id) {
            return 0;
        }

        let mut sent = 0;
        for (id, record) in &self.records {
            let pose = scene.world.pose(record.identity.entity).unwrap_or_default();
            let message = SpawnMessage {
                network_id: *id,
                prefab_id: record.prefab_id.raw(),
                authority: record.authority.mode,
                owner_id: record.authority.owner.as_str().to_owned(),
                position: pose.position,
                rotation: pose.rotation,
                custom: record.custom_payload.clone(),
            };
            match encode_spawn(&message, &self.limits) {
                Ok(payload) => {
                    session.send(
                        NetworkMessage::new(gameplay_ids::SPAWN, payload),
                        &SendOptions::player(player.id.clone(), true),
                    );
                    sent += 1;
                }
                Err(err) => warn!("cannot replay {id} to {}: {err}", player.id),
            }
        }
        if sent > 0 {
            debug!("replayed {sent} spawns to {}", player.id);
        }
        sent
    }

    /// Host only: despawns everything the departing player owned.
    ///
    /// Returns the number of entities despawned.
    pub fn on_player_left(
        &mut self,
        session: &mut Session,
        scene: &mut SceneAccess<'_>,
        player: &PlayerInfo,
    ) -> usize {
        if !self.config.despawn_owned_on_player_left || player.id.is_empty() {
            return 0;
        }
        if !session.is_in_room() || !session.is_host() {
            return 0;
        }
        let owned: Vec<NetworkId> = self
            .records
            .iter()
            .filter(|(_, record)| record.authority.owner == player.id)
            .map(|(id, _)| *id)
            .collect();
        owned
            .into_iter()
            .filter(|id| self.despawn_for_all(session, scene, *id).is_ok())
            .count()
    }

    /// Destroys every local spawn without telling anyone.
    ///
    /// Returns the number of entities destroyed.
    pub fn on_room_left(&mut self, scene: &mut SceneAccess<'_>) -> usize {
        let records = std::mem::take(&mut self.records);
        for (id, record) in &records {
            scene.syncs.detach(*id);
            scene.registry.unregister(&record.identity);
            scene.world.destroy(record.identity.entity);
        }
        records.len()
    }

    fn handle_remote_spawn(&mut self, scene: &mut SceneAccess<'_>, message: &NetworkMessage) {
        let spawn = match decode_spawn(&message.payload, &self.limits) {
            Ok(spawn) => spawn,
            Err(err) => {
                warn!("invalid spawn payload: {err}");
                return;
            }
        };
        let prefab = PrefabId::new(spawn.prefab_id);
        if !spawn.network_id.is_valid() || !prefab.is_valid() {
            debug!("ignoring spawn with invalid ids ({}, {prefab})", spawn.network_id);
            return;
        }
        if self.records.contains_key(&spawn.network_id) || scene.registry.contains(spawn.network_id) {
            debug!("ignoring duplicate spawn of {}", spawn.network_id);
            return;
        }
        let authority = Authority::new(spawn.authority, PlayerId::new(spawn.owner_id));
        if let Err(err) = self.spawn_local(
            scene,
            spawn.network_id,
            prefab,
            Pose::new(spawn.position, spawn.rotation),
            authority,
            spawn.custom,
        ) {
            warn!("remote spawn of {} failed: {err}", spawn.network_id);
        }
    }

    fn spawn_local(
        &mut self,
        scene: &mut SceneAccess<'_>,
        id: NetworkId,
        prefab: PrefabId,
        pose: Pose,
        authority: Authority,
        custom_payload: Vec<u8>,
    ) -> Result<NetworkIdentity, SpawnError> {
        let spec = self
            .catalog
            .get(prefab)
            .ok_or(SpawnError::UnknownPrefab { id: prefab })?;
        let entity = scene
            .world
            .instantiate(prefab, spec, pose)
            .ok_or(SpawnError::InstantiateFailed { id: prefab })?;

        let identity = NetworkIdentity::spawned(id, entity);
        if let Err(err) = scene.registry.register(identity) {
            scene.world.destroy(entity);
            return Err(err.into());
        }
        scene
            .syncs
            .attach(identity, spec.transform, spec.rigidbody, &authority);
        self.records.insert(
            id,
            SpawnRecord {
                prefab_id: prefab,
                authority,
                custom_payload,
                identity,
            },
        );
        Ok(identity)
    }

    fn despawn_local(&mut self, scene: &mut SceneAccess<'_>, id: NetworkId) -> bool {
        let Some(record) = self.records.remove(&id) else {
            return false;
        };
        scene.syncs.detach(id);
        scene.registry.unregister(&record.identity);
        scene.world.destroy(record.identity.entity);
        debug!("despawned {id}");
        true
    }

    fn apply_ownership_local(&mut self, scene: &mut SceneAccess<'_>, id: NetworkId, authority: Authority) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        scene.syncs.set_authority(id, &authority);
        record.authority = authority;
        true
    }
}

fn require_host(session: &Session, action: &'static str) -> Result<(), SpawnError> {
    if !session.is_in_room() {
        warn!("cannot {action}: not in room");
        return Err(SpawnError::NotInRoom);
    }
    if !session.is_host() {
        error!("only host can {action}");
        return Err(SpawnError::NotHost { action });
    }
    Ok(())
}

fn accepts_remote(session: &Session, message: &NetworkMessage) -> bool {
    if !session.is_in_room() {
        return false;
    }
    if !session.is_from_host(&message.sender) {
        debug!("ignoring message {} from non-host {}", message.id, message.sender);
        return false;
    }
    true
}
