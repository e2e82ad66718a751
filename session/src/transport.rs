//! The transport seam.
//!
//! A transport moves opaque messages between peers in a room. Every
//! operation is fire-and-forget; outcomes are queued as [`TransportEvent`]s
//! and drained by the session on the tick thread through
//! [`Transport::poll_event`].

use std::time::SystemTime;

use thiserror::Error;
use wire::MessageId;

use crate::player::{PlayerId, PlayerInfo};
use crate::properties::Properties;

/// Connection lifecycle as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Room lifecycle as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoomState {
    #[default]
    None,
    Creating,
    Joining,
    InRoom,
    Leaving,
}

/// Who receives an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SendTarget {
    /// Every player in the room, the sender included.
    All,
    /// Every player except the sender.
    Others,
    /// The current host.
    Host,
    /// A single player.
    Player(PlayerId),
}

/// Delivery options for [`Transport::send`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SendOptions {
    pub target: SendTarget,
    pub reliable: bool,
}

impl SendOptions {
    #[must_use]
    pub const fn new(target: SendTarget, reliable: bool) -> Self {
        Self { target, reliable }
    }

    #[must_use]
    pub const fn others(reliable: bool) -> Self {
        Self::new(SendTarget::Others, reliable)
    }

    #[must_use]
    pub const fn host(reliable: bool) -> Self {
        Self::new(SendTarget::Host, reliable)
    }

    #[must_use]
    pub const fn player(id: PlayerId, reliable: bool) -> Self {
        Self::new(SendTarget::Player(id), reliable)
    }
}

impl Default for SendOptions {
    fn default() -> Self {
        Self::new(SendTarget::All, true)
    }
}

/// A message in transit. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMessage {
    pub id: MessageId,
    /// Sender player id, filled in by the transport on receive.
    pub sender: PlayerId,
    pub payload: Vec<u8>,
    pub sent_at: SystemTime,
}

impl NetworkMessage {
    #[must_use]
    pub fn new(id: MessageId, payload: Vec<u8>) -> Self {
        Self {
            id,
            sender: PlayerId::none(),
            payload,
            sent_at: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn from_sender(id: MessageId, sender: PlayerId, payload: Vec<u8>) -> Self {
        Self {
            sender,
            ..Self::new(id, payload)
        }
    }
}

/// Options for [`Transport::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub player_name: String,
    pub user_id: String,
    pub game_version: String,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            player_name: "Player".to_owned(),
            user_id: String::new(),
            game_version: String::new(),
        }
    }
}

/// Options for [`Transport::create_room`].
#[derive(Debug, Clone, PartialEq)]
pub struct RoomOptions {
    /// Requested room code; empty lets the transport pick one.
    pub room_code: String,
    pub max_players: u8,
    pub is_visible: bool,
    pub is_open: bool,
    pub properties: Properties,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            room_code: String::new(),
            max_players: 4,
            is_visible: true,
            is_open: true,
            properties: Properties::new(),
        }
    }
}

/// Property keys a transport uses to match quick-match rooms.
pub mod matchmaking_keys {
    pub const QUEUE_ID: &str = "mm.queue";
    pub const MODE_ID: &str = "mm.mode";
    pub const MAP_ID: &str = "mm.map";
}

/// Options for [`Transport::quick_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuickMatchOptions {
    pub max_players: u8,
    pub is_visible: bool,
    pub is_open: bool,
    /// Prefix for the code of a room created when nothing matches.
    pub room_code_prefix: String,
    pub queue_id: String,
    pub mode_id: String,
    pub map_id: String,
    pub properties: Properties,
}

impl Default for QuickMatchOptions {
    fn default() -> Self {
        Self {
            max_players: 4,
            is_visible: true,
            is_open: true,
            room_code_prefix: "QM".to_owned(),
            queue_id: String::new(),
            mode_id: String::new(),
            map_id: String::new(),
            properties: Properties::new(),
        }
    }
}

impl QuickMatchOptions {
    /// Properties a candidate room must carry to match.
    ///
    /// Blank queue/mode/map ids are left out; custom properties are merged
    /// on top.
    #[must_use]
    pub fn match_properties(&self) -> Properties {
        let mut properties = Properties::new();
        for (key, value) in [
            (matchmaking_keys::QUEUE_ID, &self.queue_id),
            (matchmaking_keys::MODE_ID, &self.mode_id),
            (matchmaking_keys::MAP_ID, &self.map_id),
        ] {
            let value = value.trim();
            if !value.is_empty() {
                properties.insert(key, value);
            }
        }
        properties.extend_from(&self.properties);
        properties
    }
}

/// Room metadata delivered on join.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomInfo {
    pub room_code: String,
    pub max_players: u8,
    pub player_count: usize,
    pub is_open: bool,
    pub is_visible: bool,
    pub properties: Properties,
}

/// Closed set of transport error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorCode {
    Unknown,
    InvalidState,
    ConnectFailed,
    DisconnectFailed,
    CreateRoomFailed,
    JoinRoomFailed,
    LeaveRoomFailed,
    SendFailed,
}

impl TransportErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::InvalidState => "InvalidState",
            Self::ConnectFailed => "ConnectFailed",
            Self::DisconnectFailed => "DisconnectFailed",
            Self::CreateRoomFailed => "CreateRoomFailed",
            Self::JoinRoomFailed => "JoinRoomFailed",
            Self::LeaveRoomFailed => "LeaveRoomFailed",
            Self::SendFailed => "SendFailed",
        }
    }
}

impl std::fmt::Display for TransportErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by the transport or the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct TransportError {
    pub code: TransportErrorCode,
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(code: TransportErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(TransportErrorCode::InvalidState, message)
    }
}

/// Everything a transport can report.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    ConnectionStateChanged(ConnectionState),
    RoomStateChanged(RoomState),
    RoomJoined(RoomInfo),
    RoomLeft,
    PlayerJoined(PlayerInfo),
    PlayerLeft(PlayerInfo),
    MessageReceived(NetworkMessage),
    Error(TransportError),
}

/// A backend that moves messages between peers in a room.
pub trait Transport {
    fn connection_state(&self) -> ConnectionState;

    fn room_state(&self) -> RoomState;

    /// The local player's id, once the transport has assigned one.
    fn local_player_id(&self) -> Option<&PlayerId>;

    fn local_player_name(&self) -> &str;

    /// Players in the current room, the local player included.
    fn players(&self) -> &[PlayerInfo];

    fn connect(&mut self, options: &ConnectOptions);

    fn disconnect(&mut self);

    fn create_room(&mut self, options: &RoomOptions);

    fn join_room(&mut self, room_code: &str);

    fn quick_match(&mut self, options: &QuickMatchOptions);

    fn leave_room(&mut self);

    /// Sends a message. The transport stamps the sender.
    fn send(&mut self, message: NetworkMessage, options: &SendOptions);

    /// Pops the next queued event, if any.
    fn poll_event(&mut self) -> Option<TransportEvent>;
}
