//! Transport seam and session state machine for roomsync.
//!
//! The [`Transport`] trait is the only thing a network backend has to
//! implement. [`Session`] sits on top of it and turns raw connection, room,
//! player and message events into a lifecycle with ready-up and a host-driven
//! game-start handshake.
//!
//! Everything here is single-threaded and tick-driven: the embedding
//! application calls [`Session::pump`] from its own loop.

mod events;
mod player;
mod properties;
mod scene;
mod session;
mod state;
mod transport;

pub use events::{EventBus, SubscriptionId};
pub use player::{PlayerId, PlayerInfo};
pub use properties::{decode_properties, encode_properties, Properties, PropertyValue};
pub use scene::{SceneId, SceneLoader};
pub use session::Session;
pub use state::{SessionEvent, SessionState};
pub use transport::{
    matchmaking_keys, ConnectOptions, ConnectionState, NetworkMessage, QuickMatchOptions,
    RoomInfo, RoomOptions, RoomState, SendOptions, SendTarget, Transport, TransportError,
    TransportErrorCode, TransportEvent,
};
