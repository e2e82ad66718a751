//! Error types for wire format operations.

use thiserror::Error;

/// Result type for wire format operations.
pub type WireResult<T> = Result<T, DecodeError>;

/// Errors raised while decoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Payload ended before a field could be read.
    #[error("payload truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Payload carries bytes past the end of a fixed-size layout.
    #[error("payload has {remaining} unexpected trailing bytes")]
    TrailingBytes { remaining: usize },

    /// Authority mode byte is not a known mode.
    #[error("invalid authority mode: {value}")]
    InvalidAuthority { value: u8 },

    /// Transform flags carry reserved bits.
    #[error("invalid transform flags: 0x{flags:02X}")]
    InvalidFlags { flags: u8 },

    /// Length prefix is negative.
    #[error("negative length prefix: {length}")]
    NegativeLength { length: i32 },

    /// A text field is not valid UTF-8.
    #[error("text field is not valid utf-8")]
    InvalidUtf8,

    /// Property value tag is not a known kind.
    #[error("unknown property kind: {kind}")]
    UnknownPropertyKind { kind: u8 },

    /// Limits exceeded.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

/// Specific limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitKind {
    #[error("owner id bytes")]
    OwnerIdBytes,
    #[error("custom payload bytes")]
    CustomPayloadBytes,
    #[error("command payload bytes")]
    CommandPayloadBytes,
    #[error("property count")]
    PropertyCount,
    #[error("text bytes")]
    TextBytes,
}

/// Errors raised while encoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// A length-prefixed field does not fit its prefix.
    #[error("length overflow: {length} bytes does not fit a {prefix}-bit prefix")]
    LengthOverflow { length: usize, prefix: u8 },

    /// Limits exceeded.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_display() {
        let err = DecodeError::Truncated {
            needed: 24,
            available: 10,
        };
        assert_eq!(err.to_string(), "payload truncated: need 24 bytes, have 10");
    }

    #[test]
    fn invalid_flags_display() {
        let err = DecodeError::InvalidFlags { flags: 0x84 };
        assert_eq!(err.to_string(), "invalid transform flags: 0x84");
    }

    #[test]
    fn limits_exceeded_display() {
        let err = DecodeError::LimitsExceeded {
            kind: LimitKind::OwnerIdBytes,
            limit: 64,
            actual: 100,
        };
        assert_eq!(err.to_string(), "owner id bytes limit exceeded: 100 > 64");
    }

    #[test]
    fn encode_overflow_display() {
        let err = EncodeError::LengthOverflow {
            length: 70_000,
            prefix: 16,
        };
        assert_eq!(
            err.to_string(),
            "length overflow: 70000 bytes does not fit a 16-bit prefix"
        );
    }

    #[test]
    fn error_equality() {
        let a = DecodeError::NegativeLength { length: -1 };
        let b = DecodeError::NegativeLength { length: -1 };
        let c = DecodeError::NegativeLength { length: -2 };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn errors_implement_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<DecodeError>();
        assert_error::<EncodeError>();
    }
}
