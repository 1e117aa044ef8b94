//! `DAP_Info` queries issued once per session.
//!
//! A query is two bytes, `[Info][id]`. The answer is `[Info][len][payload]`
//! where `len` is controlled by the peer and must be checked before copying.

use std::fmt;

use crate::{
    commands::DapCommand,
    errors::{ProtocolError, Result},
};

/// Device properties the proxy reads during session setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoId {
    /// Probe product name string
    ProductName,
    /// Probe serial number string
    SerialNumber,
    /// CMSIS-DAP protocol (firmware) version string
    FirmwareVersion,
    /// Capabilities bitmap (one or two bytes)
    Capabilities,
}

impl InfoId {
    /// Query order used during session setup.
    pub const SEQUENCE: [Self; 4] =
        [Self::ProductName, Self::SerialNumber, Self::FirmwareVersion, Self::Capabilities];

    /// Selector byte on the wire.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ProductName => 0x02,
            Self::SerialNumber => 0x03,
            Self::FirmwareVersion => 0x04,
            Self::Capabilities => 0xF0,
        }
    }

    /// Human-readable field name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ProductName => "product name",
            Self::SerialNumber => "serial number",
            Self::FirmwareVersion => "firmware version",
            Self::Capabilities => "capabilities",
        }
    }

    /// Query for the property after this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::ProductName => Some(Self::SerialNumber),
            Self::SerialNumber => Some(Self::FirmwareVersion),
            Self::FirmwareVersion => Some(Self::Capabilities),
            Self::Capabilities => None,
        }
    }
}

impl fmt::Display for InfoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Two-byte `DAP_Info` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoRequest(pub InfoId);

impl InfoRequest {
    /// Size on the wire.
    pub const SIZE: usize = 2;

    /// Wire bytes.
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        [DapCommand::Info.to_u8(), self.0.to_u8()]
    }
}

/// Validated answer to an [`InfoRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoResponse<'a> {
    /// Property this answer belongs to
    pub id: InfoId,
    /// Payload bytes, exactly as long as the peer declared
    pub payload: &'a [u8],
}

impl<'a> InfoResponse<'a> {
    /// Decode a response record for `id`.
    ///
    /// `capacity` is the largest payload the destination can hold. The
    /// capabilities payload must additionally be one or two bytes long.
    pub fn decode(id: InfoId, bytes: &'a [u8], capacity: usize) -> Result<Self> {
        let [opcode, len, rest @ ..] = bytes else {
            return Err(ProtocolError::Truncated {
                what: "info response",
                needed: 2,
                available: bytes.len(),
            });
        };

        if *opcode != DapCommand::Info.to_u8() {
            return Err(ProtocolError::BadInfoOpcode(*opcode));
        }

        let len = usize::from(*len);
        if len == 0 {
            return Err(ProtocolError::EmptyInfo(id.name()));
        }

        if id == InfoId::Capabilities && len > 2 {
            return Err(ProtocolError::BadCapabilitiesLength(len));
        }

        if len > capacity {
            return Err(ProtocolError::InfoTooLong { field: id.name(), len, max: capacity });
        }

        let payload = rest.get(..len).ok_or(ProtocolError::Truncated {
            what: "info payload",
            needed: len,
            available: rest.len(),
        })?;

        Ok(Self { id, payload })
    }
}
