//! Message-ID allocation.
//!
//! The id space is partitioned by contract: a low range for session-core
//! control messages, a mid range for built-in gameplay primitives, and
//! everything else for the embedding application.

use thiserror::Error;

/// Message identifier as carried by transports.
pub type MessageId = i32;

/// An inclusive, contiguous range of message ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageIdRange {
    pub min: MessageId,
    pub max: MessageId,
}

impl MessageIdRange {
    #[must_use]
    pub const fn new(min: MessageId, max: MessageId) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `id` falls inside the range.
    #[must_use]
    pub const fn contains(self, id: MessageId) -> bool {
        id >= self.min && id <= self.max
    }

    /// Returns `true` if the two ranges share at least one id.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Session-core control messages.
pub const CORE_RANGE: MessageIdRange = MessageIdRange::new(1, 99);

/// Built-in gameplay primitives.
pub const GAMEPLAY_RANGE: MessageIdRange = MessageIdRange::new(180, 199);

const _: () = assert!(!CORE_RANGE.overlaps(GAMEPLAY_RANGE));

/// Core message ids.
pub mod core_ids {
    use super::MessageId;

    pub const PLAYER_READY_CHANGED: MessageId = 1;
    pub const GAME_START_REQUESTED: MessageId = 2;
}

/// Gameplay message ids.
pub mod gameplay_ids {
    use super::MessageId;

    pub const TRANSFORM_STATE: MessageId = 180;
    pub const SPAWN: MessageId = 181;
    pub const DESPAWN: MessageId = 182;
    pub const OWNERSHIP_CHANGED: MessageId = 183;
    pub const COMMAND: MessageId = 184;
    pub const RIGIDBODY_2D_STATE: MessageId = 185;
}

/// Returns `true` for ids consumed by the session state machine.
#[must_use]
pub const fn is_core_message(id: MessageId) -> bool {
    CORE_RANGE.contains(id)
}

/// Returns `true` for ids intercepted by the gameplay layer.
#[must_use]
pub const fn is_gameplay_message(id: MessageId) -> bool {
    GAMEPLAY_RANGE.contains(id)
}

/// Returns `true` for ids left to the embedding application.
#[must_use]
pub const fn is_application_message(id: MessageId) -> bool {
    !is_core_message(id) && !is_gameplay_message(id)
}

/// Exclusive upper bound for backends that carry ids as single-byte event codes.
pub const BYTE_EVENT_CODE_LIMIT: MessageId = 200;

/// A message id that the target transport cannot address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("message id {id} outside addressable range 0..{limit}")]
pub struct UnaddressableId {
    pub id: MessageId,
    pub limit: MessageId,
}

/// Validates `id` for a backend limited to single-byte event codes.
pub fn to_byte_event_code(id: MessageId) -> Result<u8, UnaddressableId> {
    u8::try_from(id)
        .ok()
        .filter(|_| id < BYTE_EVENT_CODE_LIMIT)
        .ok_or(UnaddressableId {
            id,
            limit: BYTE_EVENT_CODE_LIMIT,
        })
}
