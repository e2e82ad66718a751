//! Configurable limits for bounded decoding.

/// Size limits for variable-length payload fields.
///
/// These limits are enforced on both encode and decode so a peer can never
/// make the receiver allocate more than the configured amount for a single
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum owner id length in bytes (spawn and ownership messages).
    pub max_owner_id_bytes: usize,

    /// Maximum opaque per-spawn payload length in bytes.
    pub max_custom_payload_bytes: usize,

    /// Maximum command payload length in bytes.
    pub max_command_payload_bytes: usize,

    /// Maximum number of entries in a property bag.
    pub max_properties: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // The u16 prefix caps this anyway
            max_owner_id_bytes: u16::MAX as usize,
            max_custom_payload_bytes: 32 * 1024,
            max_command_payload_bytes: 16 * 1024,
            max_properties: 256,
        }
    }
}

impl Limits {
    /// Small limits so tests can hit every bound cheaply.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_owner_id_bytes: 64,
            max_custom_payload_bytes: 256,
            max_command_payload_bytes: 256,
            max_properties: 16,
        }
    }

    /// No bounds beyond what the length prefixes already impose.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_owner_id_bytes: usize::MAX,
            max_custom_payload_bytes: usize::MAX,
            max_command_payload_bytes: usize::MAX,
            max_properties: usize::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_owner_id_matches_prefix() {
        let limits = Limits::default();
        assert_eq!(limits.max_owner_id_bytes, 65_535);
    }

    #[test]
    fn testing_limits_are_tighter_than_default() {
        let test_limits = Limits::for_testing();
        let default_limits = Limits::default();

        assert!(test_limits.max_owner_id_bytes < default_limits.max_owner_id_bytes);
        assert!(test_limits.max_custom_payload_bytes < default_limits.max_custom_payload_bytes);
        assert!(test_limits.max_command_payload_bytes < default_limits.max_command_payload_bytes);
        assert!(test_limits.max_properties < default_limits.max_properties);
    }

    #[test]
    fn unlimited_lifts_payload_bounds() {
        let limits = Limits::unlimited();
        assert_eq!(limits.max_custom_payload_bytes, usize::MAX);
        assert_eq!(limits.max_command_payload_bytes, usize::MAX);
    }

    #[test]
    fn testing_limits_work_in_const_context() {
        const LIMITS: Limits = Limits::for_testing();
        assert_eq!(LIMITS.max_owner_id_bytes, 64);
    }
}
