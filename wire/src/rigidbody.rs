//! 2D rigidbody state samples.
//!
//! Layout: `i32 network_id | i32 sequence | f32x2 position | f32x2 velocity`.

use glam::Vec2;

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::WireResult;
use crate::types::NetworkId;

/// Exact size of a rigidbody payload.
pub const RIGIDBODY_STATE_SIZE: usize = 4 + 4 + 8 + 8;

/// One authoritative body sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rigidbody2DState {
    pub network_id: NetworkId,
    /// Sender-side counter; receivers drop samples that do not advance it.
    pub sequence: i32,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Encodes a rigidbody payload.
#[must_use]
pub fn encode_rigidbody(state: &Rigidbody2DState) -> Vec<u8> {
    let mut writer = ByteWriter::with_capacity(RIGIDBODY_STATE_SIZE);
    writer.write_i32(state.network_id.raw());
    writer.write_i32(state.sequence);
    writer.write_vec2(state.position);
    writer.write_vec2(state.velocity);
    writer.finish()
}

/// Decodes a rigidbody payload.
pub fn decode_rigidbody(buf: &[u8]) -> WireResult<Rigidbody2DState> {
    let mut reader = ByteReader::new(buf);
    reader.require(RIGIDBODY_STATE_SIZE)?;
    let state = Rigidbody2DState {
        network_id: NetworkId::new(reader.read_i32()?),
        sequence: reader.read_i32()?,
        position: reader.read_vec2()?,
        velocity: reader.read_vec2()?,
    };
    reader.expect_end()?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn fixed_size() {
        let state = Rigidbody2DState {
            network_id: NetworkId::new(9),
            sequence: 5,
            position: Vec2::new(1.0, -1.0),
            velocity: Vec2::new(0.25, 4.0),
        };
        let bytes = encode_rigidbody(&state);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[4..8], &[5, 0, 0, 0]);
        assert_eq!(decode_rigidbody(&bytes), Ok(state));
    }

    #[test]
    fn rejects_short_payload() {
        assert_eq!(
            decode_rigidbody(&[0u8; 23]),
            Err(DecodeError::Truncated {
                needed: 24,
                available: 23
            })
        );
    }

    #[test]
    fn rejects_trailing_bytes() {
        assert_eq!(
            decode_rigidbody(&[0u8; 25]),
            Err(DecodeError::TrailingBytes { remaining: 1 })
        );
    }
}
