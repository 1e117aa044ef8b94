//! Fake command producer.
//!
//! Plays the other process of the shared-memory hand-off: stage a batch,
//! raise "producer ready", wait for "consumer ready", read the result.

use elaphure_core::{SessionError, SharedRegion, TransportHandle};

/// Result of one submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Consumer `command_response`
    pub status: u32,
    /// Consumer payload
    pub payload: Vec<u8>,
}

/// Producer side of a [`TransportHandle`].
pub struct FakeProducer<R> {
    handle: TransportHandle<R>,
}

impl<R: SharedRegion> FakeProducer<R> {
    /// Wrap a handle.
    pub fn new(handle: TransportHandle<R>) -> Self {
        Self { handle }
    }

    /// Submit one batch and wait for its result.
    pub async fn submit(
        &self,
        command_count: u32,
        data: &[u8],
    ) -> Result<Completion, SessionError> {
        self.handle.region().with_memory(|memory| memory.producer.load(command_count, data))?;
        self.handle.producer_ready().raise().map_err(SessionError::Signal)?;
        self.handle.consumer_ready().wait().await.map_err(SessionError::Signal)?;

        Ok(self.handle.region().with_memory(|memory| Completion {
            status: memory.consumer.command_response,
            payload: memory.consumer.payload().to_vec(),
        }))
    }

    /// Whether the proxy reports a ready session.
    pub fn is_ready(&self) -> bool {
        self.handle.region().with_memory(|memory| memory.info.is_ready())
    }
}
