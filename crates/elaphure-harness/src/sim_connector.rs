//! Turmoil connector.
//!
//! Dials simulated hosts by name. Only usable inside a Turmoil simulation.

use std::io;

use async_trait::async_trait;
use elaphure_core::Connector;
use turmoil::net::TcpStream;

/// Connects over the Turmoil simulated network.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimConnector;

#[async_trait]
impl Connector for SimConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let addr = format!("{host}:{port}");
        TcpStream::connect(addr.as_str()).await
    }
}
