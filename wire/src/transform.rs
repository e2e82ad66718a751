//! Transform state deltas.
//!
//! Layout: `i32 network_id | u8 flags | [f32x3 position] | [f32x4 rotation]`.
//! Each component is present only when its flag bit is set.

use glam::{Quat, Vec3};

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{DecodeError, WireResult};
use crate::types::NetworkId;

/// Fixed prefix size of a transform payload.
pub const TRANSFORM_HEADER_SIZE: usize = 4 + 1;

/// Dirty-component flags for transform payloads (1 byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransformFlags(u8);

impl TransformFlags {
    /// Position is present.
    pub const POSITION: u8 = 1 << 0;
    /// Rotation is present.
    pub const ROTATION: u8 = 1 << 1;
    /// Reserved bits mask (must be zero).
    const RESERVED_MASK: u8 = !0b11;

    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn has_position(self) -> bool {
        self.0 & Self::POSITION != 0
    }

    #[must_use]
    pub const fn has_rotation(self) -> bool {
        self.0 & Self::ROTATION != 0
    }

    /// Returns `true` if no component is flagged.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if no reserved bit is set.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 & Self::RESERVED_MASK == 0
    }
}

/// A transform update carrying only the dirty components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformState {
    pub network_id: NetworkId,
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
}

impl TransformState {
    /// Flags describing which components are present.
    #[must_use]
    pub const fn flags(&self) -> TransformFlags {
        let mut raw = 0;
        if self.position.is_some() {
            raw |= TransformFlags::POSITION;
        }
        if self.rotation.is_some() {
            raw |= TransformFlags::ROTATION;
        }
        TransformFlags(raw)
    }

    /// Encoded size in bytes.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        let mut len = TRANSFORM_HEADER_SIZE;
        if self.position.is_some() {
            len += 12;
        }
        if self.rotation.is_some() {
            len += 16;
        }
        len
    }
}

/// Encodes a transform payload.
#[must_use]
pub fn encode_transform(state: &TransformState) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(state.encoded_len());
    writer.write_i32(state.network_id.raw());
    writer.write_u8(state.flags().raw());
    if let Some(position) = state.position {
        writer.write_vec3(position);
    }
    if let Some(rotation) = state.rotation {
        writer.write_quat(rotation);
    }
    writer.finish()
}

/// Decodes a transform payload.
pub fn decode_transform(buf: &[u8]) -> WireResult<TransformState> {
    let mut reader = ByteReader::new(buf);
    reader.require(TRANSFORM_HEADER_SIZE)?;
    let network_id = NetworkId::new(reader.read_i32()?);
    let flags = TransformFlags::from_raw(reader.read_u8()?);
    if !flags.is_valid() {
        return Err(DecodeError::InvalidFlags { flags: flags.raw() });
    }
    let position = if flags.has_position() {
        Some(reader.read_vec3()?)
    } else {
        None
    };
    let rotation = if flags.has_rotation() {
        Some(reader.read_quat()?)
    } else {
        None
    };
    reader.expect_end()?;
    Ok(TransformState {
        network_id,
        position,
        rotation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_from_components() {
        let state = TransformState {
            network_id: NetworkId::new(1),
            position: Some(Vec3::ZERO),
            rotation: None,
        };
        assert_eq!(state.flags().raw(), 0b01);
        assert!(state.flags().has_position());
        assert!(!state.flags().has_rotation());
    }

    #[test]
    fn flags_reserved_bits_invalid() {
        assert!(TransformFlags::from_raw(0b11).is_valid());
        assert!(!TransformFlags::from_raw(0b100).is_valid());
        assert!(TransformFlags::default().is_empty());
    }

    #[test]
    fn position_only_layout() {
        let state = TransformState {
            network_id: NetworkId::new(7),
            position: Some(Vec3::new(1.0, 2.0, 3.0)),
            rotation: None,
        };
        let bytes = encode_transform(&state);
        assert_eq!(bytes.len(), 17);
        assert_eq!(&bytes[0..5], &[7, 0, 0, 0, 1]);
        assert_eq!(&bytes[5..9], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[9..13], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[13..17], &3.0f32.to_le_bytes());

        let decoded = decode_transform(&bytes).unwrap();
        assert_eq!(decoded.network_id, NetworkId::new(7));
        assert_eq!(decoded.position, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(decoded.rotation, None);
    }

    #[test]
    fn rotation_only_layout() {
        let state = TransformState {
            network_id: NetworkId::new(2),
            position: None,
            rotation: Some(Quat::IDENTITY),
        };
        let bytes = encode_transform(&state);
        assert_eq!(bytes.len(), 21);
        assert_eq!(bytes[4], 0b10);
        assert_eq!(decode_transform(&bytes), Ok(state));
    }

    #[test]
    fn empty_update_is_header_only() {
        let state = TransformState {
            network_id: NetworkId::new(3),
            position: None,
            rotation: None,
        };
        assert_eq!(encode_transform(&state), vec![3, 0, 0, 0, 0]);
    }

    #[test]
    fn flag_without_body_is_truncated() {
        assert!(matches!(
            decode_transform(&[7, 0, 0, 0, 0b01, 0, 0]),
            Err(DecodeError::Truncated { needed: 4, .. })
        ));
    }

    #[test]
    fn reserved_flag_rejected() {
        assert_eq!(
            decode_transform(&[7, 0, 0, 0, 0x80]),
            Err(DecodeError::InvalidFlags { flags: 0x80 })
        );
    }

    #[test]
    fn header_too_short() {
        assert!(decode_transform(&[7, 0, 0, 0]).is_err());
    }
}
