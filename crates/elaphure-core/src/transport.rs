//! Connector abstraction for the probe link.
//!
//! Production dials real TCP with keep-alive configured; tests dial
//! in-process loopback sockets or simulated Turmoil hosts.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Opens the byte stream a session runs over.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connected, bidirectional byte stream.
    ///
    /// Dropping it closes the connection.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Resolve `host` and connect to `port`.
    ///
    /// Resolution and connect failures are both reported as `Err`; the
    /// caller does not distinguish them.
    async fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}
