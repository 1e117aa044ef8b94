//! Handshake frames.
//!
//! Both directions are three big-endian 32-bit words:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬─────────────────┐
//! │ link identifier │  command code   │    version      │
//! │   0x8a656c70    │   0x00000000    │   0x00000001    │
//! └─────────────────┴─────────────────┴─────────────────┘
//! ```

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, byteorder::big_endian::U32,
};

use crate::errors::{ProtocolError, Result};

/// Magic word identifying the elaphure link.
pub const LINK_IDENTIFIER: u32 = 0x8a65_6c70;

/// Command code of the handshake exchange.
pub const COMMAND_HANDSHAKE: u32 = 0x0000_0000;

/// Protocol version the proxy speaks.
pub const PROXY_VERSION: u32 = 0x0000_0001;

/// Handshake sent by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HandshakeRequest {
    identifier: U32,
    command: U32,
    version: U32,
}

/// Handshake answered by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HandshakeResponse {
    identifier: U32,
    command: U32,
    version: U32,
}

impl HandshakeRequest {
    /// Size on the wire.
    pub const SIZE: usize = 12;

    /// The handshake the proxy always sends.
    pub fn new() -> Self {
        Self::with_fields(LINK_IDENTIFIER, COMMAND_HANDSHAKE, PROXY_VERSION)
    }

    /// Build a request from explicit field values.
    pub fn with_fields(identifier: u32, command: u32, version: u32) -> Self {
        Self { identifier: U32::new(identifier), command: U32::new(command), version: U32::new(version) }
    }

    /// Command code stored in this request.
    pub fn command(&self) -> u32 {
        self.command.get()
    }

    /// Wire bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Validate the peer's answer to this request.
    ///
    /// The identifier must echo [`LINK_IDENTIFIER`]. The command code that
    /// gets checked is the one stored in *this request*, not the one the
    /// peer echoed; the echoed command is never checked.
    pub fn validate(&self, response: &HandshakeResponse) -> Result<()> {
        let found = response.identifier();
        if found != LINK_IDENTIFIER {
            return Err(ProtocolError::BadIdentifier { expected: LINK_IDENTIFIER, found });
        }

        if self.command() != COMMAND_HANDSHAKE {
            return Err(ProtocolError::UnexpectedCommand(self.command()));
        }

        Ok(())
    }
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeResponse {
    /// Size on the wire.
    pub const SIZE: usize = 12;

    /// Build a response from explicit field values.
    pub fn with_fields(identifier: u32, command: u32, version: u32) -> Self {
        Self { identifier: U32::new(identifier), command: U32::new(command), version: U32::new(version) }
    }

    /// Parse a response from exactly [`Self::SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_bytes(bytes).map_err(|_| ProtocolError::Truncated {
            what: "handshake response",
            needed: Self::SIZE,
            available: bytes.len(),
        })
    }

    /// Wire bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Link identifier announced by the peer.
    pub fn identifier(&self) -> u32 {
        self.identifier.get()
    }

    /// Command code echoed by the peer.
    pub fn command(&self) -> u32 {
        self.command.get()
    }

    /// Protocol version the peer negotiated.
    pub fn version(&self) -> u32 {
        self.version.get()
    }
}
