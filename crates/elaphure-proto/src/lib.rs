//! Wire format for the elaphure debug-probe link.
//!
//! The proxy talks to a remote CMSIS-DAP probe over TCP. Every exchange is a
//! strict request/response pair, and the protocol has three phases:
//!
//! 1. **Handshake**: three big-endian 32-bit words each way (link identifier,
//!    command code, protocol version).
//! 2. **Device info**: four `DAP_Info` queries, each answered with a
//!    self-describing `[opcode][length][payload]` record.
//! 3. **Relay**: opaque command batches go out verbatim; response batches
//!    come back as opcode-tagged records whose length is implied by the
//!    opcode, optionally wrapped in an `ExecuteCommands` envelope.
//!
//! Framing is minimal. Most records carry no length prefix, so
//! any opcode this crate does not know is a framing error that the caller
//! must treat as fatal for the session.
//!
//! # Security
//!
//! Lengths supplied by the peer are never trusted: every copy is
//! bounds-checked against both the received bytes and the destination.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod commands;
pub mod errors;
pub mod handshake;
pub mod info;

pub use batch::{DapResponse, ResponseBatch, TransferStatus};
pub use commands::{DapCommand, DapStatus};
pub use errors::{ProtocolError, Result};
pub use handshake::{
    COMMAND_HANDSHAKE, HandshakeRequest, HandshakeResponse, LINK_IDENTIFIER, PROXY_VERSION,
};
pub use info::{InfoId, InfoRequest, InfoResponse};
