//! Session error types.
//!
//! The `Display` text of a [`SessionError`] is handed verbatim to the
//! disconnect callback, which is the host's only diagnostic channel once a
//! session runs.

use std::{io, time::Duration};

use elaphure_proto::ProtocolError;
use thiserror::Error;

use crate::session::SessionState;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation not valid in the current state
    #[error("invalid operation {operation} in state {state:?}")]
    InvalidState {
        /// State the session was in
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Peer violated the wire protocol
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Address resolution or connect failed
    #[error("{0}")]
    Connect(io::Error),

    /// Socket I/O failed
    #[error("{0}")]
    Io(#[from] io::Error),

    /// Peer closed the connection
    #[error("connection closed by peer")]
    PeerClosed,

    /// Wire I/O exceeded the configured deadline
    #[error("no response from probe within {0:?}")]
    Timeout(Duration),

    /// Producer declared more data than its page holds
    #[error("producer declared {declared} bytes, page holds {capacity}")]
    ProducerOverflow {
        /// Declared `data_len`
        declared: usize,
        /// Producer page data capacity
        capacity: usize,
    },

    /// Response payload does not fit the consumer page
    #[error("response payload of {len} bytes exceeds consumer page")]
    ConsumerOverflow {
        /// Payload length
        len: usize,
    },

    /// Raising or waiting on a hand-off signal failed
    #[error("signal failed: {0}")]
    Signal(io::Error),
}
