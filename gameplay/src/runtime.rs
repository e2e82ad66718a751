//! The gameplay layer bundled behind one message entry point.

use glam::Vec2;
use log::{debug, error, trace, warn};
use session::{NetworkMessage, PlayerId, PlayerInfo, SendOptions, Session};
use wire::ids::{gameplay_ids, is_gameplay_message};
use wire::{decode_rigidbody, decode_transform, NetworkId};

use crate::authority::{Authority, LocalPeer};
use crate::catalog::PrefabCatalog;
use crate::command::{CommandDelivery, CommandError, CommandHandler, CommandRequest, CommandRouter, HandlerId};
use crate::identity::NetworkIdentity;
use crate::registry::{NetworkRegistry, RegistryError};
use crate::rigidbody_sync::{RigidbodySyncSettings, SampleOutcome};
use crate::spawner::{NetworkSpawner, SceneAccess, SpawnError, SpawnRequest, SpawnerConfig};
use crate::sync_set::SyncSet;
use crate::transform_sync::TransformSyncSettings;
use crate::world::EntityWorld;

/// Receives gameplay-range messages the built-in handlers do not own.
pub trait GameplayMessageHandler {
    /// Returns `Ok(true)` if the message was consumed.
    fn handle_message(&mut self, session: &Session, message: &NetworkMessage) -> anyhow::Result<bool>;
}

impl<F> GameplayMessageHandler for F
where
    F: FnMut(&Session, &NetworkMessage) -> anyhow::Result<bool>,
{
    fn handle_message(&mut self, session: &Session, message: &NetworkMessage) -> anyhow::Result<bool> {
        self(session, message)
    }
}

/// Registry, spawner, sync components and command router for one scene.
pub struct Gameplay {
    registry: NetworkRegistry,
    syncs: SyncSet,
    spawner: NetworkSpawner,
    commands: CommandRouter,
    handlers: Vec<(HandlerId, Box<dyn GameplayMessageHandler>)>,
    next_handler: u64,
    /// Host seen by the last rigidbody receive or physics tick.
    known_host: Option<PlayerId>,
}

impl std::fmt::Debug for Gameplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gameplay")
            .field("registry", &self.registry)
            .field("syncs", &self.syncs)
            .field("spawner", &self.spawner)
            .field("commands", &self.commands)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl Default for Gameplay {
    fn default() -> Self {
        Self::new(PrefabCatalog::default(), SpawnerConfig::default())
    }
}

impl Gameplay {
    #[must_use]
    pub fn new(catalog: PrefabCatalog, config: SpawnerConfig) -> Self {
        Self {
            registry: NetworkRegistry::new(),
            syncs: SyncSet::new(),
            spawner: NetworkSpawner::new(catalog, config),
            commands: CommandRouter::new(),
            handlers: Vec::new(),
            next_handler: 0,
            known_host: None,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn syncs(&self) -> &SyncSet {
        &self.syncs
    }

    pub fn syncs_mut(&mut self) -> &mut SyncSet {
        &mut self.syncs
    }

    #[must_use]
    pub const fn spawner(&self) -> &NetworkSpawner {
        &self.spawner
    }

    pub fn spawner_mut(&mut self) -> &mut NetworkSpawner {
        &mut self.spawner
    }

    pub fn commands_mut(&mut self) -> &mut CommandRouter {
        &mut self.commands
    }

    pub fn register_command_handler(&mut self, handler: impl CommandHandler + 'static) -> HandlerId {
        self.commands.register(handler)
    }

    pub fn register_message_handler(&mut self, handler: impl GameplayMessageHandler + 'static) -> HandlerId {
        self.next_handler += 1;
        let id = HandlerId::from_raw(self.next_handler);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unregister_message_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    /// Registers an entity placed in the scene rather than spawned.
    ///
    /// Every peer must register the same id for the same entity.
    pub fn register_scene_entity(
        &mut self,
        identity: NetworkIdentity,
        transform: Option<TransformSyncSettings>,
        rigidbody: Option<RigidbodySyncSettings>,
        authority: &Authority,
    ) -> Result<(), RegistryError> {
        self.registry.register(identity)?;
        self.syncs.attach(identity, transform, rigidbody, authority);
        Ok(())
    }

    pub fn unregister_scene_entity(&mut self, identity: &NetworkIdentity) -> bool {
        if !self.registry.unregister(identity) {
            return false;
        }
        self.syncs.detach(identity.id);
        true
    }

    pub fn spawn_for_all(
        &mut self,
        session: &mut Session,
        world: &mut dyn EntityWorld,
        request: SpawnRequest,
    ) -> Result<NetworkIdentity, SpawnError> {
        let mut scene = SceneAccess {
            registry: &mut self.registry,
            syncs: &mut self.syncs,
            world,
        };
        self.spawner.spawn_for_all(session, &mut scene, request)
    }

    pub fn despawn_for_all(
        &mut self,
        session: &mut Session,
        world: &mut dyn EntityWorld,
        id: NetworkId,
    ) -> Result<(), SpawnError> {
        let mut scene = SceneAccess {
            registry: &mut self.registry,
            syncs: &mut self.syncs,
            world,
        };
        self.spawner.despawn_for_all(session, &mut scene, id)
    }

    pub fn set_ownership_for_all(
        &mut self,
        session: &mut Session,
        world: &mut dyn EntityWorld,
        id: NetworkId,
        authority: Authority,
    ) -> Result<(), SpawnError> {
        let mut scene = SceneAccess {
            registry: &mut self.registry,
            syncs: &mut self.syncs,
            world,
        };
        self.spawner.set_ownership_for_all(session, &mut scene, id, authority)
    }

    pub fn send_command(
        &mut self,
        session: &mut Session,
        world: &mut dyn EntityWorld,
        request: CommandRequest<'_>,
    ) -> Result<CommandDelivery, CommandError> {
        self.commands.send_to_host(session, &self.registry, world, request)
    }

    /// Applies an impulse to a predicted body and opens its prediction hold.
    pub fn add_predicted_impulse(
        &mut self,
        session: &Session,
        world: &mut dyn EntityWorld,
        id: NetworkId,
        impulse: Vec2,
    ) -> bool {
        let peer = LocalPeer::of(session);
        match self.syncs.rigidbody_mut(id) {
            Some(sync) => {
                sync.add_predicted_impulse(&peer, world, impulse);
                true
            }
            None => false,
        }
    }

    /// Routes one inbound message through the gameplay handlers.
    ///
    /// Returns `false` only for ids outside the gameplay range.
    pub fn handle_message(
        &mut self,
        session: &Session,
        world: &mut dyn EntityWorld,
        message: &NetworkMessage,
    ) -> bool {
        if !is_gameplay_message(message.id) {
            return false;
        }
        match message.id {
            gameplay_ids::TRANSFORM_STATE => self.handle_transform(session, message),
            gameplay_ids::RIGIDBODY_2D_STATE => self.handle_rigidbody(session, world, message),
            gameplay_ids::SPAWN | gameplay_ids::DESPAWN | gameplay_ids::OWNERSHIP_CHANGED => {
                let mut scene = SceneAccess {
                    registry: &mut self.registry,
                    syncs: &mut self.syncs,
                    world,
                };
                self.spawner.handle_message(session, &mut scene, message);
            }
            gameplay_ids::COMMAND => {
                self.commands.handle_message(session, &self.registry, world, message);
            }
            _ => self.handle_custom(session, message),
        }
        true
    }

    /// Frame tick: interpolation and transform sends.
    pub fn frame(&mut self, session: &mut Session, world: &mut dyn EntityWorld, dt: f32) -> usize {
        let peer = LocalPeer::of(session);
        let outbound = self.syncs.frame(&peer, world, dt);
        send_unreliable(session, outbound)
    }

    /// Fixed physics tick: kinematic moves, reconciliation and body sends.
    pub fn physics(&mut self, session: &mut Session, world: &mut dyn EntityWorld, dt: f32) -> usize {
        self.track_host(session);
        let peer = LocalPeer::of(session);
        let outbound = self.syncs.physics(&peer, world, dt);
        send_unreliable(session, outbound)
    }

    pub fn on_player_joined(&mut self, session: &mut Session, world: &mut dyn EntityWorld, player: &PlayerInfo) -> usize {
        let scene = SceneAccess {
            registry: &mut self.registry,
            syncs: &mut self.syncs,
            world,
        };
        self.spawner.on_player_joined(session, &scene, player)
    }

    pub fn on_player_left(&mut self, session: &mut Session, world: &mut dyn EntityWorld, player: &PlayerInfo) -> usize {
        let mut scene = SceneAccess {
            registry: &mut self.registry,
            syncs: &mut self.syncs,
            world,
        };
        self.spawner.on_player_left(session, &mut scene, player)
    }

    /// Drops every spawned entity and resets remote sync state.
    pub fn on_room_left(&mut self, world: &mut dyn EntityWorld) -> usize {
        let mut scene = SceneAccess {
            registry: &mut self.registry,
            syncs: &mut self.syncs,
            world,
        };
        let destroyed = self.spawner.on_room_left(&mut scene);
        self.known_host = None;
        let scene_ids: Vec<NetworkId> = self.registry.iter().map(|identity| identity.id).collect();
        for id in scene_ids {
            if let Some(sync) = self.syncs.rigidbody_mut(id) {
                sync.reset_remote_state();
            }
        }
        destroyed
    }

    fn handle_transform(&mut self, session: &Session, message: &NetworkMessage) {
        let state = match decode_transform(&message.payload) {
            Ok(state) => state,
            Err(err) => {
                warn!("invalid transform payload from {}: {err}", message.sender);
                return;
            }
        };
        if !self.registry.contains(state.network_id) {
            return;
        }
        self.syncs.apply_transform(&LocalPeer::of(session), &state);
    }

    fn handle_rigidbody(&mut self, session: &Session, world: &mut dyn EntityWorld, message: &NetworkMessage) {
        let state = match decode_rigidbody(&message.payload) {
            Ok(state) => state,
            Err(err) => {
                warn!("invalid rigidbody payload from {}: {err}", message.sender);
                return;
            }
        };
        if !self.registry.contains(state.network_id) {
            return;
        }
        self.track_host(session);
        if let Some(SampleOutcome::Stale) = self.syncs.apply_rigidbody(&LocalPeer::of(session), world, &state) {
            trace!("stale rigidbody sample {} for {}", state.sequence, state.network_id);
        }
    }

    fn track_host(&mut self, session: &Session) {
        let Some(host) = session.host_player_id() else {
            return;
        };
        if self.known_host.as_ref() == Some(host) {
            return;
        }
        if self.known_host.is_some() {
            debug!("host migrated to {host}");
            self.syncs.host_changed();
        }
        self.known_host = Some(host.clone());
    }

    fn handle_custom(&mut self, session: &Session, message: &NetworkMessage) {
        for (_, handler) in &mut self.handlers {
            match handler.handle_message(session, message) {
                Ok(true) => return,
                Ok(false) => {}
                Err(err) => error!("gameplay handler failed on message {}: {err:#}", message.id),
            }
        }
        warn!("unhandled gameplay message {}", message.id);
    }
}

fn send_unreliable(session: &mut Session, outbound: Vec<NetworkMessage>) -> usize {
    let count = outbound.len();
    let options = SendOptions::others(false);
    for message in outbound {
        session.send(message, &options);
    }
    count
}

