//! Spawn, despawn and ownership-change payloads.
//!
//! Spawn layout:
//!
//! ```text
//! i32 network_id | i32 prefab_id | u8 authority | u16 owner_len | owner utf8
//! f32x3 position | f32x4 rotation (xyzw) | i32 custom_len | custom bytes
//! ```
//!
//! Despawn is a bare `i32 network_id`. Ownership change is
//! `i32 network_id | u8 authority | u16 owner_len | owner utf8`.

use glam::{Quat, Vec3};

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{DecodeError, EncodeError, LimitKind, WireResult};
use crate::limits::Limits;
use crate::types::{AuthorityMode, NetworkId};

/// Smallest possible spawn payload (empty owner, empty custom payload).
pub const SPAWN_MIN_SIZE: usize = 4 + 4 + 1 + 2 + 12 + 16 + 4;

/// Exact size of a despawn payload.
pub const DESPAWN_SIZE: usize = 4;

/// Smallest possible ownership payload (empty owner).
pub const OWNERSHIP_MIN_SIZE: usize = 4 + 1 + 2;

/// A replicated spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnMessage {
    pub network_id: NetworkId,
    pub prefab_id: i32,
    pub authority: AuthorityMode,
    /// Owner player id; empty means host-owned.
    pub owner_id: String,
    pub position: Vec3,
    pub rotation: Quat,
    /// Opaque per-spawn payload handed to the instantiated entity.
    pub custom: Vec<u8>,
}

/// A replicated ownership change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipMessage {
    pub network_id: NetworkId,
    pub authority: AuthorityMode,
    pub owner_id: String,
}

fn check_owner_len(owner_id: &str, limits: &Limits) -> Result<(), EncodeError> {
    if owner_id.len() > limits.max_owner_id_bytes {
        return Err(EncodeError::LimitsExceeded {
            kind: LimitKind::OwnerIdBytes,
            limit: limits.max_owner_id_bytes,
            actual: owner_id.len(),
        });
    }
    Ok(())
}

/// Encodes a spawn payload.
pub fn encode_spawn(message: &SpawnMessage, limits: &Limits) -> Result<Vec<u8>, EncodeError> {
    check_owner_len(&message.owner_id, limits)?;
    if message.custom.len() > limits.max_custom_payload_bytes {
        return Err(EncodeError::LimitsExceeded {
            kind: LimitKind::CustomPayloadBytes,
            limit: limits.max_custom_payload_bytes,
            actual: message.custom.len(),
        });
    }
    let custom_len = i32::try_from(message.custom.len()).map_err(|_| EncodeError::LengthOverflow {
        length: message.custom.len(),
        prefix: 32,
    })?;

    let mut writer = ByteWriter::with_capacity(
        SPAWN_MIN_SIZE + message.owner_id.len() + message.custom.len(),
    );
    writer.write_i32(message.network_id.raw());
    writer.write_i32(message.prefab_id);
    writer.write_u8(message.authority.to_byte());
    writer.write_short_str(&message.owner_id)?;
    writer.write_vec3(message.position);
    writer.write_quat(message.rotation);
    writer.write_i32(custom_len);
    writer.write_bytes(&message.custom);
    Ok(writer.finish())
}

/// Decodes a spawn payload.
pub fn decode_spawn(buf: &[u8], limits: &Limits) -> WireResult<SpawnMessage> {
    let mut reader = ByteReader::new(buf);
    reader.require(SPAWN_MIN_SIZE)?;

    let network_id = NetworkId::new(reader.read_i32()?);
    let prefab_id = reader.read_i32()?;
    let authority = AuthorityMode::from_byte(reader.read_u8()?)?;
    let owner_id = reader
        .read_short_str(LimitKind::OwnerIdBytes, limits.max_owner_id_bytes)?
        .to_owned();
    let position = reader.read_vec3()?;
    let rotation = reader.read_quat()?;

    let custom_len = reader.read_i32()?;
    let custom_len =
        usize::try_from(custom_len).map_err(|_| DecodeError::NegativeLength { length: custom_len })?;
    if custom_len > limits.max_custom_payload_bytes {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::CustomPayloadBytes,
            limit: limits.max_custom_payload_bytes,
            actual: custom_len,
        });
    }
    let custom = reader.read_bytes(custom_len)?.to_vec();
    reader.expect_end()?;

    Ok(SpawnMessage {
        network_id,
        prefab_id,
        authority,
        owner_id,
        position,
        rotation,
        custom,
    })
}

/// Encodes a despawn payload.
#[must_use]
pub fn encode_despawn(network_id: NetworkId) -> Vec<u8> {
    network_id.raw().to_le_bytes().to_vec()
}

/// Decodes a despawn payload; the payload must be exactly four bytes.
pub fn decode_despawn(buf: &[u8]) -> WireResult<NetworkId> {
    let mut reader = ByteReader::new(buf);
    let network_id = NetworkId::new(reader.read_i32()?);
    reader.expect_end()?;
    Ok(network_id)
}

/// Encodes an ownership-change payload.
pub fn encode_ownership(message: &OwnershipMessage, limits: &Limits) -> Result<Vec<u8>, EncodeError> {
    check_owner_len(&message.owner_id, limits)?;
    let mut writer = ByteWriter::with_capacity(OWNERSHIP_MIN_SIZE + message.owner_id.len());
    writer.write_i32(message.network_id.raw());
    writer.write_u8(message.authority.to_byte());
    writer.write_short_str(&message.owner_id)?;
    Ok(writer.finish())
}

/// Decodes an ownership-change payload.
pub fn decode_ownership(buf: &[u8], limits: &Limits) -> WireResult<OwnershipMessage> {
    let mut reader = ByteReader::new(buf);
    reader.require(OWNERSHIP_MIN_SIZE)?;
    let network_id = NetworkId::new(reader.read_i32()?);
    let authority = AuthorityMode::from_byte(reader.read_u8()?)?;
    let owner_id = reader
        .read_short_str(LimitKind::OwnerIdBytes, limits.max_owner_id_bytes)?
        .to_owned();
    reader.expect_end()?;
    Ok(OwnershipMessage {
        network_id,
        authority,
        owner_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spawn() -> SpawnMessage {
        SpawnMessage {
            network_id: NetworkId::new(12),
            prefab_id: 2,
            authority: AuthorityMode::Owner,
            owner_id: "p-2".to_owned(),
            position: Vec3::new(0.0, 0.5, 1.5),
            rotation: Quat::IDENTITY,
            custom: vec![1, 2, 3],
        }
    }

    #[test]
    fn spawn_min_size_is_43() {
        assert_eq!(SPAWN_MIN_SIZE, 43);
    }

    #[test]
    fn spawn_layout() {
        let bytes = encode_spawn(&sample_spawn(), &Limits::default()).unwrap();
        assert_eq!(bytes.len(), SPAWN_MIN_SIZE + 3 + 3);
        assert_eq!(&bytes[0..4], &[12, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[2, 0, 0, 0]);
        assert_eq!(bytes[8], 1);
        assert_eq!(&bytes[9..11], &[3, 0]);
        assert_eq!(&bytes[11..14], b"p-2");
        assert_eq!(&bytes[18..22], &0.5f32.to_le_bytes());
        assert_eq!(&bytes[bytes.len() - 7..bytes.len() - 3], &[3, 0, 0, 0]);
    }

    #[test]
    fn spawn_decodes_what_it_encodes() {
        let message = sample_spawn();
        let bytes = encode_spawn(&message, &Limits::default()).unwrap();
        assert_eq!(decode_spawn(&bytes, &Limits::default()), Ok(message));
    }

    #[test]
    fn spawn_rejects_short_payload() {
        let bytes = vec![0u8; SPAWN_MIN_SIZE - 1];
        assert!(matches!(
            decode_spawn(&bytes, &Limits::default()),
            Err(DecodeError::Truncated { needed: 43, .. })
        ));
    }

    #[test]
    fn spawn_rejects_negative_custom_len() {
        let mut bytes = encode_spawn(&sample_spawn(), &Limits::default()).unwrap();
        let len_at = bytes.len() - 3 - 4;
        bytes[len_at..len_at + 4].copy_from_slice(&(-1i32).to_le_bytes());
        assert_eq!(
            decode_spawn(&bytes, &Limits::default()),
            Err(DecodeError::NegativeLength { length: -1 })
        );
    }

    #[test]
    fn spawn_rejects_custom_len_past_end() {
        let mut bytes = encode_spawn(&sample_spawn(), &Limits::default()).unwrap();
        let len_at = bytes.len() - 3 - 4;
        bytes[len_at..len_at + 4].copy_from_slice(&10i32.to_le_bytes());
        assert!(matches!(
            decode_spawn(&bytes, &Limits::default()),
            Err(DecodeError::Truncated { needed: 10, .. })
        ));
    }

    #[test]
    fn spawn_rejects_unknown_authority() {
        let mut bytes = encode_spawn(&sample_spawn(), &Limits::default()).unwrap();
        bytes[8] = 9;
        assert_eq!(
            decode_spawn(&bytes, &Limits::default()),
            Err(DecodeError::InvalidAuthority { value: 9 })
        );
    }

    #[test]
    fn spawn_owner_limit() {
        let mut message = sample_spawn();
        message.owner_id = "x".repeat(65);
        assert!(matches!(
            encode_spawn(&message, &Limits::for_testing()),
            Err(EncodeError::LimitsExceeded {
                kind: LimitKind::OwnerIdBytes,
                ..
            })
        ));
    }

    #[test]
    fn despawn_exact_size() {
        let bytes = encode_despawn(NetworkId::new(300));
        assert_eq!(bytes, vec![0x2C, 0x01, 0, 0]);
        assert_eq!(decode_despawn(&bytes), Ok(NetworkId::new(300)));
        assert_eq!(
            decode_despawn(&[1, 0, 0, 0, 0]),
            Err(DecodeError::TrailingBytes { remaining: 1 })
        );
        assert!(decode_despawn(&[1, 0]).is_err());
    }

    #[test]
    fn ownership_layout() {
        let message = OwnershipMessage {
            network_id: NetworkId::new(4),
            authority: AuthorityMode::Owner,
            owner_id: "ab".to_owned(),
        };
        let bytes = encode_ownership(&message, &Limits::default()).unwrap();
        assert_eq!(bytes, vec![4, 0, 0, 0, 1, 2, 0, b'a', b'b']);
        assert_eq!(decode_ownership(&bytes, &Limits::default()), Ok(message));
    }

    #[test]
    fn ownership_rejects_short_payload() {
        assert!(matches!(
            decode_ownership(&[4, 0, 0, 0, 0, 0], &Limits::default()),
            Err(DecodeError::Truncated { needed: 7, .. })
        ));
    }
}
