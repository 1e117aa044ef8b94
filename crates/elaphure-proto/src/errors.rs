//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Framing and validation errors.
///
/// Every variant is fatal for the session that observed it. Faults the probe
/// reports in a status byte are not errors at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Handshake response carried the wrong link identifier.
    #[error("connect failed: unexpected identifier {found:#010x} (expected {expected:#010x})")]
    BadIdentifier {
        /// Identifier the proxy sent
        expected: u32,
        /// Identifier the peer answered with
        found: u32,
    },

    /// Handshake command code did not match the handshake command.
    #[error("connect failed: unexpected command {0:#010x}")]
    UnexpectedCommand(u32),

    /// Received fewer bytes than a fixed-size record requires.
    #[error("truncated {what}: need {needed} bytes, got {available}")]
    Truncated {
        /// Record being decoded
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Opcode is not part of the relay table.
    #[error("unexpected opcode {0:#04x} in response batch")]
    UnknownOpcode(u8),

    /// Response batch contained no bytes.
    #[error("empty response batch")]
    EmptyBatch,

    /// Transfer payload length is not a whole number of 32-bit words.
    #[error("transfer payload of {0} bytes is not 4-byte aligned")]
    MisalignedPayload(usize),

    /// `DAP_Info` response had the wrong opcode.
    #[error("unexpected info response opcode {0:#04x}")]
    BadInfoOpcode(u8),

    /// `DAP_Info` response declared an empty payload.
    #[error("empty info response for {0}")]
    EmptyInfo(&'static str),

    /// `DAP_Info` payload does not fit the destination field.
    #[error("info payload for {field} is {len} bytes, field holds at most {max}")]
    InfoTooLong {
        /// Field being populated
        field: &'static str,
        /// Declared payload length
        len: usize,
        /// Largest accepted length
        max: usize,
    },

    /// Capabilities payload must be one or two bytes.
    #[error("capabilities length must be 1 or 2 bytes, got {0}")]
    BadCapabilitiesLength(usize),
}
