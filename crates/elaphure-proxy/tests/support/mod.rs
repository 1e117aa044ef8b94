//! Loopback probe and polling helpers shared by the proxy tests.

#![allow(dead_code)]

use std::{
    thread,
    time::{Duration, Instant},
};

use elaphure_harness::{MockProbe, ProbeScript};
use tokio::{net::TcpListener, runtime::Runtime};

pub const READ_ONE_WORD: [u8; 4] = [0x05, 0x00, 0x01, 0x02];
pub const ONE_WORD_OK: [u8; 7] = [0x05, 0x01, 0x01, 0xEF, 0xBE, 0xAD, 0xDE];

/// Mock probe listening on a loopback port.
pub struct ProbeServer {
    pub port: u16,
    pub probe: MockProbe,
    pub runtime: Runtime,
}

impl ProbeServer {
    pub fn start(script: ProbeScript) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = MockProbe::new(script);
        let server = probe.clone();
        runtime.spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let probe = server.clone();
                tokio::spawn(async move {
                    let _ = probe.serve(stream).await;
                });
            }
        });

        Self { port, probe, runtime }
    }
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `condition` until it holds or five seconds pass.
pub fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}
