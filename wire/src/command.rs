//! Host-directed command payloads.
//!
//! Layout: `u16 command_id | i32 target | payload...` where the payload runs to
//! the end of the message.

use crate::cursor::{ByteReader, ByteWriter};
use crate::error::{DecodeError, EncodeError, LimitKind, WireResult};
use crate::limits::Limits;
use crate::types::NetworkId;

/// Fixed prefix size of a command payload.
pub const COMMAND_HEADER_SIZE: usize = 2 + 4;

/// A decoded command that borrows its payload from the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    pub command_id: u16,
    pub target: NetworkId,
    pub payload: &'a [u8],
}

/// Encodes a command payload.
pub fn encode_command(
    command_id: u16,
    target: NetworkId,
    payload: &[u8],
    limits: &Limits,
) -> Result<Vec<u8>, EncodeError> {
    if payload.len() > limits.max_command_payload_bytes {
        return Err(EncodeError::LimitsExceeded {
            kind: LimitKind::CommandPayloadBytes,
            limit: limits.max_command_payload_bytes,
            actual: payload.len(),
        });
    }
    let mut writer = ByteWriter::with_capacity(COMMAND_HEADER_SIZE + payload.len());
    writer.write_u16(command_id);
    writer.write_i32(target.raw());
    writer.write_bytes(payload);
    Ok(writer.finish())
}

/// Decodes a command payload.
pub fn decode_command<'a>(buf: &'a [u8], limits: &Limits) -> WireResult<CommandFrame<'a>> {
    let mut reader = ByteReader::new(buf);
    reader.require(COMMAND_HEADER_SIZE)?;
    let command_id = reader.read_u16()?;
    let target = NetworkId::new(reader.read_i32()?);
    let payload = reader.read_rest();
    if payload.len() > limits.max_command_payload_bytes {
        return Err(DecodeError::LimitsExceeded {
            kind: LimitKind::CommandPayloadBytes,
            limit: limits.max_command_payload_bytes,
            actual: payload.len(),
        });
    }
    Ok(CommandFrame {
        command_id,
        target,
        payload,
    })
}
