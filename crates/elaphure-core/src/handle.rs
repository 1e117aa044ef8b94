//! Transport handle.
//!
//! Bundles the shared region and both hand-off signals. Created once when
//! transport resources are acquired and passed by reference to every
//! component that needs them.

use std::sync::Arc;

use crate::{
    error::SessionError,
    region::SharedRegion,
    signal::Signal,
};

/// Region plus signal pair.
pub struct TransportHandle<R> {
    region: Arc<R>,
    producer_ready: Arc<dyn Signal>,
    consumer_ready: Arc<dyn Signal>,
}

impl<R> Clone for TransportHandle<R> {
    fn clone(&self) -> Self {
        Self {
            region: Arc::clone(&self.region),
            producer_ready: Arc::clone(&self.producer_ready),
            consumer_ready: Arc::clone(&self.consumer_ready),
        }
    }
}

impl<R: SharedRegion> TransportHandle<R> {
    /// Bundle a region with its signals.
    pub fn new(
        region: Arc<R>,
        producer_ready: Arc<dyn Signal>,
        consumer_ready: Arc<dyn Signal>,
    ) -> Self {
        Self { region, producer_ready, consumer_ready }
    }

    /// Shared region.
    pub fn region(&self) -> &R {
        &self.region
    }

    /// Signal raised by the producer when a batch is staged.
    pub fn producer_ready(&self) -> &dyn Signal {
        self.producer_ready.as_ref()
    }

    /// Signal raised by the proxy when a result is published.
    pub fn consumer_ready(&self) -> &dyn Signal {
        self.consumer_ready.as_ref()
    }

    /// Fail-stop hand-off.
    ///
    /// Clears the ready flag, poisons the consumer status and wakes the
    /// producer so it never waits on a session that is going away.
    pub fn abort(&self) -> Result<(), SessionError> {
        self.region.with_memory(|memory| {
            memory.info.set_ready(false);
            memory.consumer.invalidate();
        });
        self.consumer_ready.raise().map_err(SessionError::Signal)
    }
}
