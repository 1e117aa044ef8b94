//! Runtime of the elaphure proxy.
//!
//! Hosts the network session on a dedicated worker thread, owns the
//! memory-mapped transport region and the named signal pair, and exposes the
//! host-facing [`Proxy`] API.
//!
//! # Components
//!
//! - [`shm`]: memory-mapped region and FIFO-backed signals
//! - [`resources`]: scoped acquisition of the transport resources
//! - [`connector`]: TCP connector with keep-alive tuning
//! - [`session`]: one session on its own thread and runtime
//! - [`manager`]: single-session supervisor
//! - [`api`]: host-facing entry points
//! - [`config`]: proxy configuration

#[cfg(not(unix))]
compile_error!("elaphure-proxy needs POSIX shared memory and FIFOs");

pub mod api;
pub mod config;
pub mod connector;
pub mod error;
pub mod keepalive;
pub mod manager;
pub mod resources;
pub mod session;
pub mod shm;

pub use api::{INIT_FAILED, Proxy, START_FAILED};
pub use config::{DEFAULT_PORT, ProxyConfig, ResourceNames};
pub use connector::TcpConnector;
pub use error::{InitError, ProxyError};
pub use manager::SessionManager;
pub use resources::ProxyResources;
pub use session::NetworkSession;
pub use shm::{FifoSignal, MappedRegion};
