//! An in-process room server shared by any number of loopback transports.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use log::{debug, info};
use session::{
    ConnectOptions, ConnectionState, NetworkMessage, PlayerId, PlayerInfo, Properties,
    QuickMatchOptions, RoomInfo, RoomOptions, RoomState, SendOptions, SendTarget, Transport,
    TransportError, TransportErrorCode, TransportEvent,
};
use wire::ids::core_ids;
use wire::to_byte_event_code;

type PeerKey = u64;

/// An event plus the roster and room state the peer sees alongside it.
struct Queued {
    event: TransportEvent,
    players: Vec<PlayerInfo>,
    room_state: RoomState,
}

#[derive(Default)]
struct Peer {
    player: Option<PlayerId>,
    name: String,
    connection: ConnectionState,
    room: Option<String>,
    queue: VecDeque<Queued>,
}

struct Room {
    code: String,
    /// Join order; the first member is promoted when the host leaves.
    members: Vec<PeerKey>,
    roster: BTreeMap<PeerKey, PlayerInfo>,
    max_players: u8,
    is_open: bool,
    is_visible: bool,
    properties: Properties,
}

impl Room {
    fn players(&self) -> Vec<PlayerInfo> {
        self.members
            .iter()
            .filter_map(|key| self.roster.get(key).cloned())
            .collect()
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_code: self.code.clone(),
            max_players: self.max_players,
            player_count: self.members.len(),
            is_open: self.is_open,
            is_visible: self.is_visible,
            properties: self.properties.clone(),
        }
    }

    fn host(&self) -> Option<PeerKey> {
        self.members
            .iter()
            .copied()
            .find(|key| self.roster.get(key).is_some_and(|player| player.is_host))
    }

    fn is_full(&self) -> bool {
        self.max_players > 0 && self.members.len() >= usize::from(self.max_players)
    }
}

#[derive(Default)]
struct HubState {
    peers: BTreeMap<PeerKey, Peer>,
    rooms: BTreeMap<String, Room>,
    next_peer: PeerKey,
    next_room: u64,
    byte_event_codes: bool,
    delivered: u64,
}

impl HubState {
    fn room_of(&self, key: PeerKey) -> Option<&Room> {
        let code = self.peers.get(&key)?.room.as_ref()?;
        self.rooms.get(code)
    }

    fn push(&mut self, key: PeerKey, event: TransportEvent) {
        let (players, room_state) = match self.room_of(key) {
            Some(room) => (room.players(), RoomState::InRoom),
            None => (Vec::new(), RoomState::None),
        };
        if let Some(peer) = self.peers.get_mut(&key) {
            peer.queue.push_back(Queued {
                event,
                players,
                room_state,
            });
        }
    }

    fn error(&mut self, key: PeerKey, code: TransportErrorCode, message: &str) {
        debug!("loopback peer {key}: {code}: {message}");
        self.push(key, TransportEvent::Error(TransportError::new(code, message)));
    }

    fn connect(&mut self, key: PeerKey, options: &ConnectOptions) {
        let Some(peer) = self.peers.get_mut(&key) else {
            return;
        };
        if peer.connection != ConnectionState::Disconnected {
            self.error(key, TransportErrorCode::InvalidState, "Already connected/connecting.");
            return;
        }
        let id = if options.user_id.trim().is_empty() {
            format!("player-{key}")
        } else {
            options.user_id.clone()
        };
        peer.player = Some(PlayerId::new(id));
        peer.name = if options.player_name.is_empty() {
            "Player".to_owned()
        } else {
            options.player_name.clone()
        };
        peer.connection = ConnectionState::Connected;
        self.push(key, TransportEvent::ConnectionStateChanged(ConnectionState::Connecting));
        self.push(key, TransportEvent::ConnectionStateChanged(ConnectionState::Connected));
    }

    fn disconnect(&mut self, key: PeerKey) {
        let connected = self
            .peers
            .get(&key)
            .is_some_and(|peer| peer.connection != ConnectionState::Disconnected);
        if !connected {
            return;
        }
        self.leave_room(key);
        if let Some(peer) = self.peers.get_mut(&key) {
            peer.connection = ConnectionState::Disconnected;
            peer.player = None;
        }
        self.push(key, TransportEvent::ConnectionStateChanged(ConnectionState::Disconnected));
    }

    fn require_lobby(&mut self, key: PeerKey, code: TransportErrorCode) -> bool {
        let Some(peer) = self.peers.get(&key) else {
            return false;
        };
        if peer.connection != ConnectionState::Connected {
            self.error(key, TransportErrorCode::InvalidState, "Not connected.");
            return false;
        }
        if peer.room.is_some() {
            self.error(key, code, "Already in a room.");
            return false;
        }
        true
    }

    fn local_info(&self, key: PeerKey) -> Option<PlayerInfo> {
        let peer = self.peers.get(&key)?;
        Some(PlayerInfo::new(peer.player.clone()?, peer.name.clone()))
    }

    fn generate_code(&mut self, prefix: &str) -> String {
        loop {
            self.next_room += 1;
            let code = format!("{prefix}{:04}", self.next_room);
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    fn create_room(&mut self, key: PeerKey, options: &RoomOptions) {
        if !self.require_lobby(key, TransportErrorCode::CreateRoomFailed) {
            return;
        }
        let code = if options.room_code.trim().is_empty() {
            self.generate_code("ROOM-")
        } else {
            options.room_code.clone()
        };
        if self.rooms.contains_key(&code) {
            self.error(key, TransportErrorCode::CreateRoomFailed, "Room already exists.");
            return;
        }
        let Some(local) = self.local_info(key) else {
            return;
        };
        let room = Room {
            code: code.clone(),
            members: vec![key],
            roster: BTreeMap::from([(key, local.with_host(true))]),
            max_players: options.max_players,
            is_open: options.is_open,
            is_visible: options.is_visible,
            properties: options.properties.clone(),
        };
        let info = room.info();
        self.rooms.insert(code.clone(), room);
        if let Some(peer) = self.peers.get_mut(&key) {
            peer.room = Some(code.clone());
        }
        info!("loopback room {code} created");
        self.push(key, TransportEvent::RoomStateChanged(RoomState::InRoom));
        self.push(key, TransportEvent::RoomJoined(info));
    }

    fn join_room(&mut self, key: PeerKey, code: &str) {
        if !self.require_lobby(key, TransportErrorCode::JoinRoomFailed) {
            return;
        }
        let refusal = match self.rooms.get(code) {
            None => Some("Room not found."),
            Some(room) if !room.is_open => Some("Room is closed."),
            Some(room) if room.is_full() => Some("Room is full."),
            Some(_) => None,
        };
        if let Some(reason) = refusal {
            self.error(key, TransportErrorCode::JoinRoomFailed, reason);
            return;
        }
        let Some(local) = self.local_info(key) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        room.members.push(key);
        room.roster.insert(key, local.clone());
        let info = room.info();
        let others: Vec<PeerKey> = room.members.iter().copied().filter(|other| *other != key).collect();
        if let Some(peer) = self.peers.get_mut(&key) {
            peer.room = Some(code.to_owned());
        }
        for other in others {
            self.push(other, TransportEvent::PlayerJoined(local.clone()));
        }
        self.push(key, TransportEvent::RoomStateChanged(RoomState::InRoom));
        self.push(key, TransportEvent::RoomJoined(info));
    }

    fn quick_match(&mut self, key: PeerKey, options: &QuickMatchOptions) {
        if !self.require_lobby(key, TransportErrorCode::JoinRoomFailed) {
            return;
        }
        let filter = options.match_properties();
        let found = self
            .rooms
            .values()
            .find(|room| {
                room.is_open
                    && room.is_visible
                    && !room.is_full()
                    && (options.max_players == 0 || room.max_players == options.max_players)
                    && room.properties.matches(&filter)
            })
            .map(|room| room.code.clone());
        if let Some(code) = found {
            self.join_room(key, &code);
            return;
        }
        let code = self.generate_code(&format!("{}-", options.room_code_prefix));
        self.create_room(
            key,
            &RoomOptions {
                room_code: code,
                max_players: options.max_players,
                is_visible: options.is_visible,
                is_open: options.is_open,
                properties: filter,
            },
        );
    }

    fn leave_room(&mut self, key: PeerKey) {
        let Some(code) = self.peers.get_mut(&key).and_then(|peer| peer.room.take()) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        room.members.retain(|member| *member != key);
        let Some(leaving) = room.roster.remove(&key) else {
            return;
        };
        if room.members.is_empty() {
            self.rooms.remove(&code);
            info!("loopback room {code} closed");
        } else {
            if room.host().is_none() {
                let promoted = room.members[0];
                if let Some(player) = room.roster.get_mut(&promoted) {
                    player.is_host = true;
                    info!("loopback room {code}: {} promoted to host", player.id);
                }
            }
            let others = room.members.clone();
            for other in others {
                self.push(other, TransportEvent::PlayerLeft(leaving.clone()));
            }
        }
        self.push(key, TransportEvent::RoomStateChanged(RoomState::None));
        self.push(key, TransportEvent::RoomLeft);
    }

    fn send(&mut self, key: PeerKey, mut message: NetworkMessage, options: &SendOptions) {
        let Some(room) = self.room_of(key) else {
            self.error(key, TransportErrorCode::InvalidState, "Not in room.");
            return;
        };
        if self.byte_event_codes {
            if let Err(err) = to_byte_event_code(message.id) {
                let text = err.to_string();
                self.error(key, TransportErrorCode::InvalidState, &text);
                return;
            }
        }
        let Some(sender) = room.roster.get(&key).map(|player| player.id.clone()) else {
            return;
        };
        let recipients: Vec<PeerKey> = match &options.target {
            SendTarget::All => room.members.clone(),
            SendTarget::Others => room.members.iter().copied().filter(|member| *member != key).collect(),
            SendTarget::Host => room.host().into_iter().collect(),
            SendTarget::Player(target) => room
                .members
                .iter()
                .copied()
                .filter(|member| room.roster.get(member).is_some_and(|player| player.id == *target))
                .collect(),
        };

        if message.id == core_ids::PLAYER_READY_CHANGED {
            let ready = message.payload.first() == Some(&1);
            if let Some(code) = self.peers.get(&key).and_then(|peer| peer.room.clone()) {
                if let Some(player) = self.rooms.get_mut(&code).and_then(|room| room.roster.get_mut(&key)) {
                    player.is_ready = ready;
                }
            }
        }

        message.sender = sender;
        for recipient in recipients {
            self.delivered += 1;
            self.push(recipient, TransportEvent::MessageReceived(message.clone()));
        }
    }
}

/// The shared room server. Cloning yields another handle to the same hub.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Rc<RefCell<HubState>>,
}

impl std::fmt::Debug for LoopbackHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("LoopbackHub")
            .field("peers", &state.peers.len())
            .field("rooms", &state.rooms.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LoopbackHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub that rejects message ids a single-byte event code cannot carry.
    #[must_use]
    pub fn with_byte_event_codes() -> Self {
        let hub = Self::default();
        hub.state.borrow_mut().byte_event_codes = true;
        hub
    }

    /// Attaches a new, disconnected peer.
    #[must_use]
    pub fn transport(&self) -> LoopbackTransport {
        let mut state = self.state.borrow_mut();
        state.next_peer += 1;
        let key = state.next_peer;
        state.peers.insert(key, Peer::default());
        LoopbackTransport {
            hub: Rc::clone(&self.state),
            key,
            local: None,
            name: String::new(),
            connection: ConnectionState::Disconnected,
            room_state: RoomState::None,
            players: Vec::new(),
        }
    }

    #[must_use]
    pub fn room_codes(&self) -> Vec<String> {
        self.state.borrow().rooms.keys().cloned().collect()
    }

    /// Current roster of `room_code`, in join order.
    #[must_use]
    pub fn room_players(&self, room_code: &str) -> Vec<PlayerInfo> {
        self.state
            .borrow()
            .rooms
            .get(room_code)
            .map(Room::players)
            .unwrap_or_default()
    }

    /// Messages delivered to a peer queue since the hub was created.
    #[must_use]
    pub fn delivered_messages(&self) -> u64 {
        self.state.borrow().delivered
    }

    /// Events queued and not yet polled, across all peers.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.state.borrow().peers.values().map(|peer| peer.queue.len()).sum()
    }
}

/// One peer's view of a [`LoopbackHub`].
///
/// Roster and room state are snapshots taken when the current event was
/// queued, so the session sees them consistent with that event.
pub struct LoopbackTransport {
    hub: Rc<RefCell<HubState>>,
    key: PeerKey,
    local: Option<PlayerId>,
    name: String,
    connection: ConnectionState,
    room_state: RoomState,
    players: Vec<PlayerInfo>,
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("key", &self.key)
            .field("local", &self.local)
            .field("connection", &self.connection)
            .field("room_state", &self.room_state)
            .field("players", &self.players.len())
            .finish_non_exhaustive()
    }
}

impl Transport for LoopbackTransport {
    fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    fn room_state(&self) -> RoomState {
        self.room_state
    }

    fn local_player_id(&self) -> Option<&PlayerId> {
        self.local.as_ref()
    }

    fn local_player_name(&self) -> &str {
        &self.name
    }

    fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    fn connect(&mut self, options: &ConnectOptions) {
        self.hub.borrow_mut().connect(self.key, options);
    }

    fn disconnect(&mut self) {
        self.hub.borrow_mut().disconnect(self.key);
    }

    fn create_room(&mut self, options: &RoomOptions) {
        self.hub.borrow_mut().create_room(self.key, options);
    }

    fn join_room(&mut self, room_code: &str) {
        self.hub.borrow_mut().join_room(self.key, room_code);
    }

    fn quick_match(&mut self, options: &QuickMatchOptions) {
        self.hub.borrow_mut().quick_match(self.key, options);
    }

    fn leave_room(&mut self) {
        self.hub.borrow_mut().leave_room(self.key);
    }

    fn send(&mut self, message: NetworkMessage, options: &SendOptions) {
        self.hub.borrow_mut().send(self.key, message, options);
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let mut hub = self.hub.borrow_mut();
        let peer = hub.peers.get_mut(&self.key)?;
        let queued = peer.queue.pop_front()?;
        self.players = queued.players;
        self.room_state = queued.room_state;
        match &queued.event {
            TransportEvent::ConnectionStateChanged(state) => {
                self.connection = *state;
                if *state == ConnectionState::Disconnected {
                    self.local = None;
                } else {
                    self.local.clone_from(&peer.player);
                    self.name.clone_from(&peer.name);
                }
            }
            TransportEvent::RoomLeft => self.players.clear(),
            _ => {}
        }
        Some(queued.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(hub: &LoopbackHub, id: &str) -> LoopbackTransport {
        let mut transport = hub.transport();
        transport.connect(&ConnectOptions {
            player_name: id.to_uppercase(),
            user_id: id.to_owned(),
            ..ConnectOptions::default()
        });
        drain(&mut transport);
        transport
    }

    fn drain(transport: &mut LoopbackTransport) -> Vec<TransportEvent> {
        std::iter::from_fn(|| transport.poll_event()).collect()
    }

    #[test]
    fn connect_assigns_identity_on_poll() {
        let hub = LoopbackHub::new();
        let mut transport = hub.transport();
        transport.connect(&ConnectOptions::default());
        assert_eq!(transport.local_player_id(), None);
        let events = drain(&mut transport);
        assert_eq!(events.len(), 2);
        assert_eq!(transport.connection_state(), ConnectionState::Connected);
        assert_eq!(transport.local_player_id().map(PlayerId::as_str), Some("player-1"));
        assert_eq!(transport.local_player_name(), "Player");
    }

    #[test]
    fn second_connect_is_invalid_state() {
        let hub = LoopbackHub::new();
        let mut transport = connected(&hub, "a");
        transport.connect(&ConnectOptions::default());
        let events = drain(&mut transport);
        assert!(matches!(
            events.as_slice(),
            [TransportEvent::Error(err)] if err.code == TransportErrorCode::InvalidState
        ));
    }

    #[test]
    fn join_notifies_existing_members_only() {
        let hub = LoopbackHub::new();
        let mut host = connected(&hub, "h");
        let mut client = connected(&hub, "c");
        host.create_room(&RoomOptions {
            room_code: "R1".to_owned(),
            ..RoomOptions::default()
        });
        drain(&mut host);
        client.join_room("R1");

        let host_events = drain(&mut host);
        assert!(matches!(host_events.as_slice(), [TransportEvent::PlayerJoined(p)] if p.id.as_str() == "c"));
        assert_eq!(host.players().len(), 2);

        let client_events = drain(&mut client);
        assert!(client_events.iter().any(|event| matches!(event, TransportEvent::RoomJoined(info) if info.player_count == 2)));
        assert!(!client_events.iter().any(|event| matches!(event, TransportEvent::PlayerJoined(_))));
        assert_eq!(client.room_state(), RoomState::InRoom);
        assert!(client.players().iter().any(|p| p.id.as_str() == "h" && p.is_host));
    }

    #[test]
    fn join_failures() {
        let hub = LoopbackHub::new();
        let mut host = connected(&hub, "h");
        let mut a = connected(&hub, "a");
        let mut b = connected(&hub, "b");
        a.join_room("missing");
        assert!(matches!(
            drain(&mut a).as_slice(),
            [TransportEvent::Error(err)] if err.code == TransportErrorCode::JoinRoomFailed
        ));

        host.create_room(&RoomOptions {
            room_code: "SMALL".to_owned(),
            max_players: 2,
            ..RoomOptions::default()
        });
        a.join_room("SMALL");
        b.join_room("SMALL");
        assert!(matches!(
            drain(&mut b).as_slice(),
            [TransportEvent::Error(err)] if err.message == "Room is full."
        ));
    }

    #[test]
    fn host_leaving_promotes_next_member() {
        let hub = LoopbackHub::new();
        let mut host = connected(&hub, "h");
        let mut a = connected(&hub, "a");
        let mut b = connected(&hub, "b");
        host.create_room(&RoomOptions {
            room_code: "R".to_owned(),
            ..RoomOptions::default()
        });
        a.join_room("R");
        b.join_room("R");
        drain(&mut a);
        drain(&mut b);

        host.leave_room();
        let events = drain(&mut host);
        assert!(matches!(events.last(), Some(TransportEvent::RoomLeft)));
        assert!(host.players().is_empty());

        drain(&mut a);
        assert!(a.players().iter().any(|p| p.id.as_str() == "a" && p.is_host));
        assert_eq!(hub.room_players("R").len(), 2);

        a.leave_room();
        b.leave_room();
        assert!(hub.room_codes().is_empty());
    }

    #[test]
    fn send_targets() {
        let hub = LoopbackHub::new();
        let mut host = connected(&hub, "h");
        let mut a = connected(&hub, "a");
        let mut b = connected(&hub, "b");
        host.create_room(&RoomOptions {
            room_code: "R".to_owned(),
            ..RoomOptions::default()
        });
        a.join_room("R");
        b.join_room("R");
        for transport in [&mut host, &mut a, &mut b] {
            drain(transport);
        }

        a.send(NetworkMessage::new(300, vec![1]), &SendOptions::host(true));
        a.send(NetworkMessage::new(301, vec![]), &SendOptions::player(PlayerId::from("b"), true));
        a.send(NetworkMessage::new(302, vec![]), &SendOptions::others(false));

        let received = |events: Vec<TransportEvent>| -> Vec<(i32, String)> {
            events
                .into_iter()
                .filter_map(|event| match event {
                    TransportEvent::MessageReceived(message) => {
                        Some((message.id, message.sender.as_str().to_owned()))
                    }
                    _ => None,
                })
                .collect()
        };
        assert_eq!(received(drain(&mut host)), vec![(300, "a".to_owned()), (302, "a".to_owned())]);
        assert_eq!(received(drain(&mut b)), vec![(301, "a".to_owned()), (302, "a".to_owned())]);
        assert!(received(drain(&mut a)).is_empty());
        assert_eq!(hub.delivered_messages(), 4);
    }

    #[test]
    fn byte_event_codes_are_validated() {
        let hub = LoopbackHub::with_byte_event_codes();
        let mut host = connected(&hub, "h");
        host.create_room(&RoomOptions::default());
        drain(&mut host);
        host.send(NetworkMessage::new(250, vec![]), &SendOptions::others(true));
        assert!(matches!(
            drain(&mut host).as_slice(),
            [TransportEvent::Error(err)] if err.code == TransportErrorCode::InvalidState
        ));
    }

    #[test]
    fn quick_match_joins_matching_room() {
        let hub = LoopbackHub::new();
        let mut first = connected(&hub, "first");
        let mut second = connected(&hub, "second");
        let mut other = connected(&hub, "other");
        let options = QuickMatchOptions {
            queue_id: "ranked".to_owned(),
            ..QuickMatchOptions::default()
        };
        first.quick_match(&options);
        second.quick_match(&options);
        other.quick_match(&QuickMatchOptions {
            queue_id: "casual".to_owned(),
            ..QuickMatchOptions::default()
        });
        drain(&mut first);
        drain(&mut second);
        drain(&mut other);

        let codes = hub.room_codes();
        assert_eq!(codes.len(), 2);
        assert!(codes.iter().all(|code| code.starts_with("QM-")));
        assert_eq!(first.players().len(), 2);
        assert_eq!(other.players().len(), 1);
    }
}
