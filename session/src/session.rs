//! The session state machine.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use wire::ids::core_ids;

use crate::events::{EventBus, SubscriptionId};
use crate::player::{PlayerId, PlayerInfo};
use crate::scene::SceneId;
use crate::state::{SessionEvent, SessionState};
use crate::transport::{
    ConnectOptions, ConnectionState, NetworkMessage, QuickMatchOptions, RoomInfo, RoomOptions,
    RoomState, SendOptions, Transport, TransportError, TransportEvent,
};

/// Connection/room lifecycle, ready-up and game-start handshake.
///
/// The session owns the transport. Transport events are drained with
/// [`Session::pump`], applied to the session, and handed back so the caller
/// can route them to gameplay. Semantic events are published synchronously to
/// subscribers and also queued for [`Session::take_events`].
pub struct Session {
    transport: Box<dyn Transport>,
    state: SessionState,
    room_code: String,
    ready: BTreeMap<PlayerId, bool>,
    bus: EventBus<SessionEvent>,
    pending: Vec<SessionEvent>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("room_code", &self.room_code)
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[must_use]
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: SessionState::Offline,
            room_code: String::new(),
            ready: BTreeMap::new(),
            bus: EventBus::new(),
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    #[must_use]
    pub fn local_player_id(&self) -> Option<&PlayerId> {
        self.transport
            .local_player_id()
            .filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn players(&self) -> &[PlayerInfo] {
        self.transport.players()
    }

    /// `true` while the transport reports an active room.
    #[must_use]
    pub fn is_in_room(&self) -> bool {
        self.transport.room_state() == RoomState::InRoom
    }

    /// `true` if the transport roster marks the local player as host.
    #[must_use]
    pub fn is_host(&self) -> bool {
        let Some(local) = self.local_player_id() else {
            return false;
        };
        self.players()
            .iter()
            .find(|player| &player.id == local)
            .is_some_and(|player| player.is_host)
    }

    /// The first player the roster marks as host.
    #[must_use]
    pub fn host_player_id(&self) -> Option<&PlayerId> {
        self.players()
            .iter()
            .find(|player| player.is_host)
            .map(|player| &player.id)
    }

    /// `true` if `sender` is the current host.
    #[must_use]
    pub fn is_from_host(&self, sender: &PlayerId) -> bool {
        !sender.is_empty() && self.host_player_id() == Some(sender)
    }

    #[must_use]
    pub fn local_ready(&self) -> bool {
        self.local_player_id()
            .and_then(|id| self.ready.get(id))
            .copied()
            .unwrap_or(false)
    }

    #[must_use]
    pub fn is_ready(&self, player: &PlayerId) -> bool {
        self.ready.get(player).copied().unwrap_or(false)
    }

    #[must_use]
    pub const fn ready_by_player(&self) -> &BTreeMap<PlayerId, bool> {
        &self.ready
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&SessionEvent) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Drains the events published since the last call.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn connect(&mut self, options: &ConnectOptions) {
        self.set_state(SessionState::Connecting);
        self.transport.connect(options);
    }

    pub fn disconnect(&mut self) {
        self.transport.disconnect();
    }

    pub fn create_room(&mut self, options: &RoomOptions) {
        self.set_state(SessionState::CreatingRoom);
        self.transport.create_room(options);
    }

    pub fn join_room(&mut self, room_code: &str) {
        self.set_state(SessionState::JoiningRoom);
        self.transport.join_room(room_code);
    }

    pub fn quick_match(&mut self, options: &QuickMatchOptions) {
        self.set_state(SessionState::JoiningRoom);
        self.transport.quick_match(options);
    }

    /// Leaves the current room; a no-op when not in one.
    pub fn leave_room(&mut self) {
        if self.transport.room_state() == RoomState::None {
            debug!("leave_room ignored: not in a room");
            return;
        }
        self.transport.leave_room();
    }

    /// Sets the local ready flag and broadcasts it.
    pub fn set_ready(&mut self, ready: bool) -> Result<(), TransportError> {
        if self.state != SessionState::InRoom {
            return Err(self.reject("Not in room."));
        }
        let Some(local) = self.local_player_id().cloned() else {
            return Err(self.reject("Local player id is missing."));
        };

        self.ready.insert(local.clone(), ready);
        self.emit(SessionEvent::PlayerReadyChanged {
            player: local.clone(),
            ready,
        });

        let message = NetworkMessage::from_sender(
            core_ids::PLAYER_READY_CHANGED,
            local,
            vec![u8::from(ready)],
        );
        self.transport.send(message, &SendOptions::others(true));
        Ok(())
    }

    /// Host-only: moves every peer to `StartingGame` for `scene`.
    pub fn request_start(&mut self, scene: &SceneId) -> Result<(), TransportError> {
        if self.state != SessionState::InRoom {
            return Err(self.reject("Not in room."));
        }
        if !self.is_host() {
            return Err(self.reject("Only host can start the game."));
        }

        self.set_state(SessionState::StartingGame);
        let sender = self.local_player_id().cloned().unwrap_or_default();
        let message = NetworkMessage::from_sender(
            core_ids::GAME_START_REQUESTED,
            sender,
            scene.as_str().as_bytes().to_vec(),
        );
        self.transport.send(message, &SendOptions::others(true));
        info!("game start requested: {scene}");
        self.emit(SessionEvent::GameStartRequested(scene.clone()));
        Ok(())
    }

    /// Marks the requested scene as loaded.
    pub fn mark_in_game(&mut self) -> Result<(), TransportError> {
        if self.state != SessionState::StartingGame {
            return Err(self.reject("Game is not starting."));
        }
        self.set_state(SessionState::InGame);
        Ok(())
    }

    pub fn send(&mut self, message: NetworkMessage, options: &SendOptions) {
        self.transport.send(message, options);
    }

    /// Pops one transport event, applies it, and returns it.
    pub fn poll_event(&mut self) -> Option<TransportEvent> {
        let event = self.transport.poll_event()?;
        self.handle_transport_event(&event);
        Some(event)
    }

    /// Drains every queued transport event, applies it, and returns it.
    pub fn pump(&mut self) -> Vec<TransportEvent> {
        std::iter::from_fn(|| self.poll_event()).collect()
    }

    /// Applies one transport event to the session.
    pub fn handle_transport_event(&mut self, event: &TransportEvent) {
        match event {
            TransportEvent::ConnectionStateChanged(state) => self.on_connection_state(*state),
            TransportEvent::RoomStateChanged(state) => debug!("room state: {state:?}"),
            TransportEvent::RoomJoined(room) => self.on_room_joined(room),
            TransportEvent::RoomLeft => self.on_room_left(),
            TransportEvent::PlayerJoined(player) => {
                if !player.id.is_empty() {
                    self.ready.entry(player.id.clone()).or_insert(false);
                }
                self.emit(SessionEvent::PlayerJoined(player.clone()));
            }
            TransportEvent::PlayerLeft(player) => {
                self.ready.remove(&player.id);
                self.emit(SessionEvent::PlayerLeft(player.clone()));
            }
            TransportEvent::MessageReceived(message) => self.on_message(message),
            TransportEvent::Error(error) => {
                warn!("transport error: {error}");
                self.emit(SessionEvent::Error(error.clone()));
            }
        }
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        match state {
            ConnectionState::Connecting => self.set_state(SessionState::Connecting),
            ConnectionState::Connected => {
                if !self.state.is_in_room() {
                    self.set_state(SessionState::Online);
                }
            }
            ConnectionState::Disconnected => {
                self.room_code.clear();
                self.ready.clear();
                self.set_state(SessionState::Offline);
            }
            ConnectionState::Disconnecting => {}
        }
    }

    fn on_room_joined(&mut self, room: &RoomInfo) {
        self.room_code.clone_from(&room.room_code);
        self.ready = self
            .transport
            .players()
            .iter()
            .filter(|player| !player.id.is_empty())
            .map(|player| (player.id.clone(), player.is_ready))
            .collect();
        info!("joined room {}", self.room_code);
        self.set_state(SessionState::InRoom);
    }

    fn on_room_left(&mut self) {
        self.room_code.clear();
        self.ready.clear();
        let next = if self.transport.connection_state() == ConnectionState::Connected {
            SessionState::Online
        } else {
            SessionState::Offline
        };
        self.set_state(next);
    }

    fn on_message(&mut self, message: &NetworkMessage) {
        if !self.state.is_in_room() {
            return;
        }
        match message.id {
            core_ids::PLAYER_READY_CHANGED => {
                let Some(&flag) = message.payload.first() else {
                    return;
                };
                if message.sender.is_empty() {
                    return;
                }
                let ready = flag == 1;
                self.ready.insert(message.sender.clone(), ready);
                self.emit(SessionEvent::PlayerReadyChanged {
                    player: message.sender.clone(),
                    ready,
                });
            }
            core_ids::GAME_START_REQUESTED => {
                if !self.is_from_host(&message.sender) {
                    debug!("ignoring game start from non-host {}", message.sender);
                    return;
                }
                let scene = SceneId::new(String::from_utf8_lossy(&message.payload));
                self.set_state(SessionState::StartingGame);
                self.emit(SessionEvent::GameStartRequested(scene));
            }
            _ => {}
        }
    }

    fn reject(&mut self, message: &str) -> TransportError {
        let error = TransportError::invalid_state(message);
        warn!("{error}");
        self.emit(SessionEvent::Error(error.clone()));
        error
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!("session state {:?} -> {state:?}", self.state);
        self.state = state;
        self.emit(SessionEvent::StateChanged(state));
    }

    fn emit(&mut self, event: SessionEvent) {
        self.bus.publish(&event);
        self.pending.push(event);
    }
}
