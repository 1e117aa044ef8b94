//! Producer/consumer hand-off signals.
//!
//! Two binary, auto-resetting signals order all access to the shared
//! region: the producer raises "producer ready" after staging a batch, the
//! proxy raises "consumer ready" after publishing the result. Raising an
//! already-raised signal is a no-op, and a successful wait consumes it.

use std::io;

use async_trait::async_trait;
use tokio::sync::{
    Mutex,
    mpsc::{self, error::TrySendError},
};

/// A binary auto-reset signal.
#[async_trait]
pub trait Signal: Send + Sync + 'static {
    /// Set the signal. Coalesces with a pending raise.
    fn raise(&self) -> io::Result<()>;

    /// Wait until the signal is set, then reset it.
    async fn wait(&self) -> io::Result<()>;

    /// Consume the signal if it is set, without waiting.
    fn try_wait(&self) -> io::Result<bool>;
}

/// In-process signal backed by a capacity-1 channel.
///
/// The single slot is the "one batch in flight" bound: a second raise
/// before the matching wait finds the slot full and is absorbed.
#[derive(Debug)]
pub struct ChannelSignal {
    tx: mpsc::Sender<()>,
    rx: Mutex<mpsc::Receiver<()>>,
}

impl ChannelSignal {
    /// Create an unset signal.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self { tx, rx: Mutex::new(rx) }
    }
}

impl Default for ChannelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Signal for ChannelSignal {
    fn raise(&self) -> io::Result<()> {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Closed(())) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "signal receiver dropped"))
            },
        }
    }

    async fn wait(&self) -> io::Result<()> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "signal sender dropped"))
    }

    fn try_wait(&self) -> io::Result<bool> {
        let Ok(mut rx) = self.rx.try_lock() else {
            return Ok(false);
        };
        Ok(rx.try_recv().is_ok())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[test]
    fn raises_coalesce() {
        let signal = ChannelSignal::new();
        signal.raise().unwrap();
        signal.raise().unwrap();
        assert!(signal.try_wait().unwrap());
        assert!(!signal.try_wait().unwrap());
    }

    #[tokio::test]
    async fn wait_consumes_a_pending_raise() {
        let signal = ChannelSignal::new();
        signal.raise().unwrap();
        signal.wait().await.unwrap();
        assert!(!signal.try_wait().unwrap());
    }

    #[tokio::test]
    async fn wait_blocks_until_raised() {
        let signal = Arc::new(ChannelSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        signal.raise().unwrap();
        waiter.await.unwrap().unwrap();
    }
}
