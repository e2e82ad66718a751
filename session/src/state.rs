//! Session states and the events the session publishes.

use crate::player::{PlayerId, PlayerInfo};
use crate::scene::SceneId;
use crate::transport::TransportError;

/// Session lifecycle.
///
/// `Offline -> Connecting -> Online -> {CreatingRoom | JoiningRoom} -> InRoom
/// -> StartingGame -> InGame`, collapsing to `Offline` on disconnect and to
/// `Online`/`Offline` on room leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Offline,
    Connecting,
    Online,
    CreatingRoom,
    JoiningRoom,
    InRoom,
    StartingGame,
    InGame,
}

impl SessionState {
    /// States in which room traffic is processed.
    #[must_use]
    pub const fn is_in_room(self) -> bool {
        matches!(self, Self::InRoom | Self::StartingGame | Self::InGame)
    }
}

/// Semantic events re-published by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    PlayerJoined(PlayerInfo),
    PlayerLeft(PlayerInfo),
    PlayerReadyChanged { player: PlayerId, ready: bool },
    GameStartRequested(SceneId),
    Error(TransportError),
}
