//! Identifier and enum types shared by the payload codecs.

use crate::error::DecodeError;

/// Network identity shared by every peer in a room.
///
/// Valid ids are strictly positive; zero and negatives mean "no entity".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NetworkId(i32);

impl NetworkId {
    /// The "no entity" id.
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Returns `true` if the id can name an entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl From<i32> for NetworkId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<NetworkId> for i32 {
    fn from(value: NetworkId) -> Self {
        value.0
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which peer drives an entity's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AuthorityMode {
    /// The room's current host.
    #[default]
    Host = 0,
    /// A designated owner player.
    Owner = 1,
}

impl AuthorityMode {
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    pub const fn from_byte(value: u8) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Self::Host),
            1 => Ok(Self::Owner),
            _ => Err(DecodeError::InvalidAuthority { value }),
        }
    }
}
