//! Core logic of the elaphure proxy.
//!
//! The proxy relays opaque CMSIS-DAP command batches between a local command
//! producer, which shares a fixed-layout memory region with us, and a remote
//! probe reached over TCP.
//!
//! # Architecture
//!
//! Protocol decisions live in [`session::SessionMachine`], a deterministic
//! state machine that never performs I/O. Each transition returns
//! declarative [`session::SessionAction`]s. [`driver::SessionDriver`]
//! interprets those actions against a byte stream, the shared region and the
//! signal pair. The threaded runtime and the real socket live in a separate
//! crate, so the same driver runs in production, in unit tests and under
//! network simulation.
//!
//! # Components
//!
//! - [`region`]: byte-exact shared memory layout and the [`SharedRegion`] seam
//! - [`signal`]: the producer/consumer hand-off signals
//! - [`handle`]: the transport handle threaded through every component
//! - [`session`]: session state machine
//! - [`relay`]: mapping of response batches onto the consumer page
//! - [`driver`]: async executor for session actions
//! - [`transport`]: connector abstraction
//! - [`keepalive`]: keep-alive policy
//! - [`listener`]: host-facing connect/disconnect notifications
//! - [`error`]: session error types

pub mod driver;
pub mod error;
pub mod handle;
pub mod keepalive;
pub mod listener;
pub mod region;
pub mod relay;
pub mod session;
pub mod signal;
pub mod transport;

pub use driver::{SessionDriver, SessionTarget, Shutdown};
pub use error::SessionError;
pub use handle::TransportHandle;
pub use keepalive::{KeepAlivePolicy, OsVersion};
pub use listener::{Listeners, ProxyListener, StatusCallback};
pub use region::{HeapRegion, SharedMemory, SharedRegion};
pub use session::{SessionAction, SessionMachine, SessionState};
pub use signal::{ChannelSignal, Signal};
pub use transport::Connector;
