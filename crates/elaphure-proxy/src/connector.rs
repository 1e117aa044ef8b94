//! TCP connector.

use std::io;

use async_trait::async_trait;
use elaphure_core::{Connector, KeepAlivePolicy, OsVersion};
use tokio::net::TcpStream;
use tracing::debug;

use crate::keepalive;

/// Dials probes over TCP.
///
/// Every connection gets `TCP_NODELAY` and, on a new enough kernel, the
/// keep-alive policy.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    keepalive: KeepAlivePolicy,
    os: Option<OsVersion>,
}

impl TcpConnector {
    /// Connector for the running kernel.
    pub fn new(keepalive: KeepAlivePolicy) -> Self {
        Self::with_os(keepalive, keepalive::os_version())
    }

    /// Connector that assumes kernel release `os`.
    pub fn with_os(keepalive: KeepAlivePolicy, os: Option<OsVersion>) -> Self {
        Self { keepalive, os }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(KeepAlivePolicy::default())
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;

        if self.keepalive.applies_to(self.os) {
            keepalive::apply(&stream, &self.keepalive)?;
            debug!(peer = ?stream.peer_addr().ok(), "keep-alive enabled");
        } else {
            debug!(os = ?self.os, "keep-alive tuning skipped");
        }

        Ok(stream)
    }
}
