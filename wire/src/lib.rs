//! Message-ID ranges and payload codecs for roomsync.
//!
//! This crate owns the binary contract between peers: which message ids
//! belong to whom, and the little-endian layouts of every built-in gameplay
//! payload. It knows nothing about sessions, rooms or entities beyond the
//! integer ids carried on the wire.
//!
//! # Design Principles
//!
//! - **Fixed layouts** - Every payload has a documented, little-endian layout.
//! - **Bounded decoding** - Length fields are validated against [`Limits`] before allocation.
//! - **No panics** - Malformed input produces a [`DecodeError`], never a panic.

mod command;
mod cursor;
mod error;
pub mod ids;
mod limits;
mod rigidbody;
mod spawn;
mod transform;
mod types;

pub use command::{decode_command, encode_command, CommandFrame, COMMAND_HEADER_SIZE};
pub use cursor::{ByteReader, ByteWriter};
pub use error::{DecodeError, EncodeError, LimitKind, WireResult};
pub use ids::{
    is_application_message, is_core_message, is_gameplay_message, to_byte_event_code, MessageId,
    MessageIdRange, UnaddressableId,
};
pub use limits::Limits;
pub use rigidbody::{decode_rigidbody, encode_rigidbody, Rigidbody2DState, RIGIDBODY_STATE_SIZE};
pub use spawn::{
    decode_despawn, decode_ownership, decode_spawn, encode_despawn, encode_ownership,
    encode_spawn, OwnershipMessage, SpawnMessage, DESPAWN_SIZE, OWNERSHIP_MIN_SIZE,
    SPAWN_MIN_SIZE,
};
pub use transform::{
    decode_transform, encode_transform, TransformFlags, TransformState, TRANSFORM_HEADER_SIZE,
};
pub use types::{AuthorityMode, NetworkId};
