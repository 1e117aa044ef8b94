//! Session state machine.
//!
//! One session is one TCP connection to a probe. The machine decides what
//! goes on the wire and what lands in the shared region; the driver carries
//! those decisions out.
//!
//! ```text
//! ┌──────┐ begin ┌────────────┐ connected ┌─────────────┐ valid ┌──────────────┐
//! │ Idle │──────>│ Connecting │──────────>│ Handshaking │──────>│ QueryingInfo │
//! └──────┘       └────────────┘           └─────────────┘       └──────────────┘
//!                      │                         │                  │ 4 answers
//!                      │ error                   │ error            ↓
//!                      │                  ┌────────┐  error   ┌──────────┐
//!                      └─────────────────>│ Closed │<─────────│ Relaying │
//!                                         └────────┘          └──────────┘
//! ```
//!
//! In `Relaying` the machine alternates between waiting for the producer and
//! waiting for the probe. At most one batch is ever in flight.

use bytes::Bytes;
use elaphure_proto::{
    HandshakeRequest, HandshakeResponse, InfoId, InfoRequest, InfoResponse, ResponseBatch,
};

use crate::{error::SessionError, region::InfoPage, relay};

/// Text passed to the connect callback once a session is ready.
pub const CONNECT_SUCCEEDED: &str = "connect succeeded";

/// Actions returned by the session machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write these bytes to the probe
    Send(Bytes),

    /// Read exactly this many bytes and feed them to `receive`
    ReadExact(usize),

    /// Read one burst (a single read) and feed it to `receive`
    ReadBurst,

    /// Zero the device info fields of the info page
    ClearDeviceInfo,

    /// Copy a validated info answer into the info page
    StoreInfo {
        /// Property being stored
        id: InfoId,
        /// Payload, already bounded by the field capacity
        payload: Bytes,
    },

    /// Set the ready flag
    MarkReady,

    /// Fire the connect callback
    NotifyConnected(String),

    /// Wait for the producer, then call `produce`
    AwaitProducer,

    /// Publish a batch result and raise the consumer signal
    Respond {
        /// Value for `command_response`
        status: u32,
        /// Consumer payload
        payload: Bytes,
    },

    /// Tear the session down
    Close {
        /// Text for the disconnect callback
        reason: String,
    },
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing attempted
    Idle,
    /// Resolving and connecting
    Connecting,
    /// Handshake sent, waiting for the answer
    Handshaking,
    /// Reading device properties
    QueryingInfo,
    /// Relaying producer batches
    Relaying,
    /// Terminated
    Closed,
}

/// Session state machine
///
/// Pure: performs no I/O and never touches the shared region itself.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    handshake: HandshakeRequest,
    query: InfoId,
    in_flight: Option<u32>,
    close_reason: Option<String>,
}

impl SessionMachine {
    /// Create a machine that sends the standard handshake.
    pub fn new() -> Self {
        Self::with_handshake(HandshakeRequest::new())
    }

    /// Create a machine that sends `handshake`.
    pub fn with_handshake(handshake: HandshakeRequest) -> Self {
        Self {
            state: SessionState::Idle,
            handshake,
            query: InfoId::ProductName,
            in_flight: None,
            close_reason: None,
        }
    }

    /// Get current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Reason the session closed, once it has.
    #[must_use]
    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }

    /// Command count of the batch awaiting a response.
    #[must_use]
    pub fn in_flight(&self) -> Option<u32> {
        self.in_flight
    }

    /// Start connecting.
    ///
    /// # Errors
    /// Returns `InvalidState` if not in Idle state
    pub fn begin(&mut self) -> Result<(), SessionError> {
        self.expect(SessionState::Idle, "begin")?;
        self.state = SessionState::Connecting;
        Ok(())
    }

    /// The TCP connection is up: send the handshake.
    ///
    /// # Errors
    /// Returns `InvalidState` if not in Connecting state
    pub fn connected(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.expect(SessionState::Connecting, "connected")?;
        self.state = SessionState::Handshaking;

        Ok(vec![
            SessionAction::Send(Bytes::copy_from_slice(&self.handshake.to_bytes())),
            SessionAction::ReadExact(HandshakeResponse::SIZE),
        ])
    }

    /// Feed bytes read from the probe.
    ///
    /// # Errors
    /// - `InvalidState` if no read was requested
    /// - `Protocol` if the peer's bytes are malformed
    pub fn receive(&mut self, bytes: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        match self.state {
            SessionState::Handshaking => self.receive_handshake(bytes),
            SessionState::QueryingInfo => self.receive_info(bytes),
            SessionState::Relaying if self.in_flight.is_some() => self.receive_batch(bytes),
            state => Err(SessionError::InvalidState { state, operation: "receive" }),
        }
    }

    /// The producer staged a batch.
    ///
    /// # Errors
    /// Returns `InvalidState` unless relaying with nothing in flight
    pub fn produce(
        &mut self,
        command_count: u32,
        data: Bytes,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Relaying || self.in_flight.is_some() {
            return Err(SessionError::InvalidState { state: self.state, operation: "produce" });
        }

        self.in_flight = Some(command_count);
        Ok(vec![SessionAction::Send(data), SessionAction::ReadBurst])
    }

    /// Close after an error.
    ///
    /// Returns the `Close` action the first time only; later calls are
    /// no-ops so the disconnect callback fires at most once.
    pub fn close(&mut self, reason: impl Into<String>) -> Vec<SessionAction> {
        if self.state == SessionState::Closed {
            return vec![];
        }

        let reason = reason.into();
        self.state = SessionState::Closed;
        self.in_flight = None;
        self.close_reason = Some(reason.clone());
        vec![SessionAction::Close { reason }]
    }

    /// Close on request of the host. Produces no actions.
    pub fn halt(&mut self) {
        self.state = SessionState::Closed;
        self.in_flight = None;
    }

    fn receive_handshake(&mut self, bytes: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        let response = HandshakeResponse::from_bytes(bytes)?;
        self.handshake.validate(&response)?;

        self.state = SessionState::QueryingInfo;
        self.query = InfoId::ProductName;

        Ok(vec![SessionAction::ClearDeviceInfo, self.query_action(), SessionAction::ReadBurst])
    }

    fn receive_info(&mut self, bytes: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        let id = self.query;
        let answer = InfoResponse::decode(id, bytes, InfoPage::capacity(id))?;

        let mut actions =
            vec![SessionAction::StoreInfo { id, payload: Bytes::copy_from_slice(answer.payload) }];

        match id.next() {
            Some(next) => {
                self.query = next;
                actions.push(self.query_action());
                actions.push(SessionAction::ReadBurst);
            },
            None => {
                self.state = SessionState::Relaying;
                actions.push(SessionAction::MarkReady);
                actions.push(SessionAction::NotifyConnected(CONNECT_SUCCEEDED.to_string()));
                actions.push(SessionAction::AwaitProducer);
            },
        }

        Ok(actions)
    }

    fn receive_batch(&mut self, bytes: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        let command_count = self.in_flight.take().unwrap_or_default();
        let batch = ResponseBatch::decode(bytes)?;
        let outcome = relay::settle(&batch, command_count);

        Ok(vec![
            SessionAction::Respond {
                status: outcome.status,
                payload: Bytes::copy_from_slice(outcome.payload),
            },
            SessionAction::AwaitProducer,
        ])
    }

    fn query_action(&self) -> SessionAction {
        SessionAction::Send(Bytes::copy_from_slice(&InfoRequest(self.query).to_bytes()))
    }

    fn expect(&self, state: SessionState, operation: &'static str) -> Result<(), SessionError> {
        if self.state == state {
            Ok(())
        } else {
            Err(SessionError::InvalidState { state: self.state, operation })
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use elaphure_proto::{COMMAND_HANDSHAKE, LINK_IDENTIFIER, PROXY_VERSION, ProtocolError};

    use super::*;

    fn handshake_reply() -> [u8; 12] {
        HandshakeResponse::with_fields(LINK_IDENTIFIER, COMMAND_HANDSHAKE, PROXY_VERSION)
            .to_bytes()
    }

    fn relaying() -> SessionMachine {
        let mut machine = SessionMachine::new();
        machine.begin().unwrap();
        machine.connected().unwrap();
        machine.receive(&handshake_reply()).unwrap();
        machine.receive(&[0x00, 0x04, b'P', b'r', b'o', b'b']).unwrap();
        machine.receive(&[0x00, 0x02, b'4', b'2']).unwrap();
        machine.receive(&[0x00, 0x03, b'2', b'.', b'1']).unwrap();
        machine.receive(&[0x00, 0x01, 0x13]).unwrap();
        machine
    }

    #[test]
    fn connected_sends_handshake() {
        let mut machine = SessionMachine::new();
        machine.begin().unwrap();
        let actions = machine.connected().unwrap();

        assert_eq!(machine.state(), SessionState::Handshaking);
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0],
            SessionAction::Send(Bytes::copy_from_slice(&HandshakeRequest::new().to_bytes()))
        );
        assert_eq!(actions[1], SessionAction::ReadExact(12));
    }

    #[test]
    fn cannot_connect_twice() {
        let mut machine = SessionMachine::new();
        machine.begin().unwrap();
        machine.connected().unwrap();

        let result = machine.connected();
        assert!(matches!(
            result,
            Err(SessionError::InvalidState { state: SessionState::Handshaking, .. })
        ));
    }

    #[test]
    fn valid_handshake_starts_info_queries() {
        let mut machine = SessionMachine::new();
        machine.begin().unwrap();
        machine.connected().unwrap();

        let actions = machine.receive(&handshake_reply()).unwrap();
        assert_eq!(machine.state(), SessionState::QueryingInfo);
        assert_eq!(
            actions,
            vec![
                SessionAction::ClearDeviceInfo,
                SessionAction::Send(Bytes::from_static(&[0x00, 0x02])),
                SessionAction::ReadBurst,
            ]
        );
    }

    #[test]
    fn bad_identifier_is_rejected() {
        let mut machine = SessionMachine::new();
        machine.begin().unwrap();
        machine.connected().unwrap();

        let reply = HandshakeResponse::with_fields(0xDEAD_BEEF, 0, 1).to_bytes();
        let err = machine.receive(&reply).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(ProtocolError::BadIdentifier { .. })));
        assert!(err.to_string().contains("identifier"));
    }

    #[test]
    fn echoed_command_is_not_checked() {
        let mut machine = SessionMachine::new();
        machine.begin().unwrap();
        machine.connected().unwrap();

        let reply = HandshakeResponse::with_fields(LINK_IDENTIFIER, 0x55, 9).to_bytes();
        assert!(machine.receive(&reply).is_ok());
    }

    #[test]
    fn info_sequence_ends_in_ready() {
        let mut machine = SessionMachine::new();
        machine.begin().unwrap();
        machine.connected().unwrap();
        machine.receive(&handshake_reply()).unwrap();

        let actions = machine.receive(&[0x00, 0x03, b'a', b'b', b'c']).unwrap();
        assert_eq!(
            actions[0],
            SessionAction::StoreInfo { id: InfoId::ProductName, payload: Bytes::from_static(b"abc") }
        );
        assert_eq!(actions[1], SessionAction::Send(Bytes::from_static(&[0x00, 0x03])));

        machine.receive(&[0x00, 0x01, b's']).unwrap();
        machine.receive(&[0x00, 0x01, b'f']).unwrap();
        let actions = machine.receive(&[0x00, 0x02, 0x13, 0x00]).unwrap();

        assert_eq!(machine.state(), SessionState::Relaying);
        assert_eq!(
            actions,
            vec![
                SessionAction::StoreInfo {
                    id: InfoId::Capabilities,
                    payload: Bytes::from_static(&[0x13, 0x00]),
                },
                SessionAction::MarkReady,
                SessionAction::NotifyConnected(CONNECT_SUCCEEDED.to_string()),
                SessionAction::AwaitProducer,
            ]
        );
    }

    #[test]
    fn oversized_capabilities_rejected() {
        let mut machine = SessionMachine::new();
        machine.begin().unwrap();
        machine.connected().unwrap();
        machine.receive(&handshake_reply()).unwrap();
        machine.receive(&[0x00, 0x01, b'p']).unwrap();
        machine.receive(&[0x00, 0x01, b's']).unwrap();
        machine.receive(&[0x00, 0x01, b'f']).unwrap();

        let err = machine.receive(&[0x00, 0x03, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, SessionError::Protocol(ProtocolError::BadCapabilitiesLength(3))));
    }

    #[test]
    fn one_batch_in_flight() {
        let mut machine = relaying();
        let actions = machine.produce(1, Bytes::from_static(&[0x05, 0x00, 0x01, 0x02])).unwrap();
        assert_eq!(actions[1], SessionAction::ReadBurst);
        assert_eq!(machine.in_flight(), Some(1));

        let err = machine.produce(1, Bytes::new()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { operation: "produce", .. }));
    }

    #[test]
    fn batch_response_is_settled() {
        let mut machine = relaying();
        machine.produce(1, Bytes::from_static(&[0x05, 0x00, 0x01, 0x02])).unwrap();

        let actions = machine.receive(&[0x05, 0x01, 0x01, 9, 8, 7, 6]).unwrap();
        assert_eq!(
            actions,
            vec![
                SessionAction::Respond { status: 1, payload: Bytes::from_static(&[9, 8, 7, 6]) },
                SessionAction::AwaitProducer,
            ]
        );
        assert_eq!(machine.in_flight(), None);
    }

    #[test]
    fn unsolicited_bytes_while_relaying_are_invalid() {
        let mut machine = relaying();
        let result = machine.receive(&[0x05, 0x01, 0x01]);
        assert!(matches!(result, Err(SessionError::InvalidState { operation: "receive", .. })));
    }

    #[test]
    fn close_fires_once() {
        let mut machine = relaying();
        assert_eq!(
            machine.close("connection closed by peer"),
            vec![SessionAction::Close { reason: "connection closed by peer".to_string() }]
        );
        assert!(machine.close("again").is_empty());
        assert_eq!(machine.close_reason(), Some("connection closed by peer"));
    }

    #[test]
    fn halt_is_silent() {
        let mut machine = relaying();
        machine.halt();
        assert_eq!(machine.state(), SessionState::Closed);
        assert!(machine.close("late").is_empty());
    }
}
