//! Steady-state response batches.
//!
//! A batch is either a single record or an `ExecuteCommands` envelope:
//!
//! ```text
//! single:    [opcode][record body...]
//! envelope:  [0x7F][count][record][record]...
//! ```
//!
//! Record length is implied by the opcode:
//!
//! | Opcode | Layout |
//! |---|---|
//! | Connect, SWJ_Clock, SWJ_Sequence, SWD_Configure | `[op][byte]` |
//! | TransferConfigure | `[op][status]` |
//! | WriteABORT | `[op][status]` (nonzero is a fault) |
//! | Transfer | `[op][count][status][words...]` |
//! | TransferBlock | `[op][count lo][count hi][status][words...]` |
//!
//! Transfer payloads are not length-prefixed, so a transfer record always
//! runs to the end of the burst and ends the batch.

use crate::{
    commands::{DapCommand, DapStatus},
    errors::{ProtocolError, Result},
};

/// Raw status byte of a transfer response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatus(pub u8);

impl TransferStatus {
    /// Acknowledge encoded in the low three bits.
    pub fn ack(self) -> Option<DapStatus> {
        DapStatus::from_ack(self.0)
    }

    /// Status word reported to the producer.
    pub fn to_u32(self) -> u32 {
        u32::from(self.0)
    }
}

/// One decoded response record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DapResponse<'a> {
    /// `DAP_Connect`: selected port
    Connect {
        /// Port the probe connected with
        port: u8,
    },
    /// `DAP_SWJ_Clock`
    SwjClock {
        /// Command status
        status: u8,
    },
    /// `DAP_SWJ_Sequence`
    SwjSequence {
        /// Command status
        status: u8,
    },
    /// `DAP_SWD_Configure`
    SwdConfigure {
        /// Command status
        status: u8,
    },
    /// `DAP_TransferConfigure`
    TransferConfigure {
        /// Command status
        status: u8,
    },
    /// `DAP_Transfer`
    Transfer {
        /// Number of transfers the probe executed
        count: u8,
        /// Acknowledge of the last transfer
        status: TransferStatus,
        /// Read data words, verbatim
        data: &'a [u8],
    },
    /// `DAP_TransferBlock`
    TransferBlock {
        /// Number of transfers the probe executed
        count: u16,
        /// Acknowledge of the last transfer
        status: TransferStatus,
        /// Read data words, verbatim
        data: &'a [u8],
    },
    /// `DAP_WriteABORT`
    WriteAbort {
        /// Zero on success
        status: u8,
    },
}

impl<'a> DapResponse<'a> {
    /// Decode the record starting at `bytes[0]`.
    ///
    /// Returns the record and the number of bytes it occupies.
    pub fn decode(bytes: &'a [u8]) -> Result<(Self, usize)> {
        let Some(&opcode) = bytes.first() else {
            return Err(ProtocolError::Truncated { what: "response record", needed: 1, available: 0 });
        };

        let command = DapCommand::from_u8(opcode).ok_or(ProtocolError::UnknownOpcode(opcode))?;

        match command {
            DapCommand::Connect
            | DapCommand::SwjClock
            | DapCommand::SwjSequence
            | DapCommand::SwdConfigure
            | DapCommand::TransferConfigure
            | DapCommand::WriteAbort => {
                let value = need(bytes, 2, "response record")?[1];
                let response = match command {
                    DapCommand::Connect => Self::Connect { port: value },
                    DapCommand::SwjClock => Self::SwjClock { status: value },
                    DapCommand::SwjSequence => Self::SwjSequence { status: value },
                    DapCommand::SwdConfigure => Self::SwdConfigure { status: value },
                    DapCommand::TransferConfigure => Self::TransferConfigure { status: value },
                    _ => Self::WriteAbort { status: value },
                };
                Ok((response, 2))
            },
            DapCommand::Transfer => {
                let header = need(bytes, 3, "transfer response")?;
                let data = aligned(&bytes[3..])?;
                let response =
                    Self::Transfer { count: header[1], status: TransferStatus(header[2]), data };
                Ok((response, bytes.len()))
            },
            DapCommand::TransferBlock => {
                let header = need(bytes, 4, "transfer block response")?;
                let count = u16::from_le_bytes([header[1], header[2]]);
                let data = aligned(&bytes[4..])?;
                let response =
                    Self::TransferBlock { count, status: TransferStatus(header[3]), data };
                Ok((response, bytes.len()))
            },
            _ => Err(ProtocolError::UnknownOpcode(opcode)),
        }
    }

    /// Transfer records consume the rest of the burst.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transfer { .. } | Self::TransferBlock { .. })
    }
}

/// A decoded response burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBatch<'a> {
    /// Whether the burst used the `ExecuteCommands` envelope
    pub enveloped: bool,
    /// Records in wire order
    pub responses: Vec<DapResponse<'a>>,
}

impl<'a> ResponseBatch<'a> {
    /// Decode one response burst.
    ///
    /// Bytes after the declared number of records (or after a transfer
    /// record) are ignored.
    pub fn decode(bytes: &'a [u8]) -> Result<Self> {
        let Some(&first) = bytes.first() else {
            return Err(ProtocolError::EmptyBatch);
        };

        if first != DapCommand::ExecuteCommands.to_u8() {
            let (response, _) = DapResponse::decode(bytes)?;
            return Ok(Self { enveloped: false, responses: vec![response] });
        }

        let header = need(bytes, 2, "execute commands envelope")?;
        let count = usize::from(header[1]);
        let mut responses = Vec::with_capacity(count);
        let mut offset = 2;

        for _ in 0..count {
            let (response, consumed) = DapResponse::decode(&bytes[offset..])?;
            offset += consumed;
            let terminal = response.is_terminal();
            responses.push(response);
            if terminal {
                break;
            }
        }

        Ok(Self { enveloped: true, responses })
    }
}

fn need<'a>(bytes: &'a [u8], needed: usize, what: &'static str) -> Result<&'a [u8]> {
    bytes.get(..needed).ok_or(ProtocolError::Truncated { what, needed, available: bytes.len() })
}

fn aligned(data: &[u8]) -> Result<&[u8]> {
    if data.len() % 4 == 0 { Ok(data) } else { Err(ProtocolError::MisalignedPayload(data.len())) }
}
