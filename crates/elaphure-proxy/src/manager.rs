//! Single-session supervisor.
//!
//! At most one session exists at a time. Starting a new one first stops
//! the current session and waits a short grace period so the producer can
//! observe the forced stop before the ready flag comes back.
//!
//! The slot lock is only held to swap sessions in and out, never while a
//! session starts or stops, so callbacks may call back into the manager.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};

use elaphure_core::{
    Connector, Listeners, ProxyListener, SessionTarget, SharedRegion, TransportHandle,
};

use crate::{error::ProxyError, session::NetworkSession};

/// Owns the current session, if any.
pub struct SessionManager<R: SharedRegion, C> {
    handle: TransportHandle<R>,
    connector: C,
    listeners: Arc<Listeners>,
    io_timeout: Option<Duration>,
    stop_grace: Duration,
    current: Mutex<Option<NetworkSession<R>>>,
}

impl<R: SharedRegion, C: Connector + Clone> SessionManager<R, C> {
    /// Manager with no running session.
    pub fn new(handle: TransportHandle<R>, connector: C, listeners: Arc<Listeners>) -> Self {
        Self {
            handle,
            connector,
            listeners,
            io_timeout: None,
            stop_grace: Duration::ZERO,
            current: Mutex::new(None),
        }
    }

    /// Bound every wire read and write of future sessions.
    #[must_use]
    pub fn with_io_timeout(mut self, limit: Option<Duration>) -> Self {
        self.io_timeout = limit;
        self
    }

    /// Pause after stopping a running session.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Replace any running session with one dialing `host:port`.
    ///
    /// Blocks until the new session is relaying or has failed. The previous
    /// session is fully stopped before the new one dials.
    pub fn start_with_address(&self, host: &str, port: u16) -> Result<(), ProxyError> {
        self.stop();

        let listener: Arc<dyn ProxyListener> = self.listeners.clone();
        let session = NetworkSession::start(
            self.handle.clone(),
            self.connector.clone(),
            SessionTarget::new(host, port),
            listener,
            self.io_timeout,
        )?;

        // A concurrent start may have won the slot in the meantime.
        let displaced = self.slot().replace(session);
        if let Some(mut displaced) = displaced {
            displaced.stop();
        }
        Ok(())
    }

    /// Stop the running session. Does nothing when none runs.
    pub fn stop(&self) {
        let taken = self.slot().take();
        if let Some(mut session) = taken {
            session.stop();
            if !self.stop_grace.is_zero() {
                thread::sleep(self.stop_grace);
            }
        }
    }

    /// Whether a session exists and is relaying.
    pub fn is_running(&self) -> bool {
        self.slot().as_ref().is_some_and(NetworkSession::is_relaying)
    }

    /// Callbacks every session reports to.
    pub fn listeners(&self) -> &Arc<Listeners> {
        &self.listeners
    }

    fn slot(&self) -> MutexGuard<'_, Option<NetworkSession<R>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: SharedRegion, C> Drop for SessionManager<R, C> {
    fn drop(&mut self) {
        let current = self.current.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut session) = current.take() {
            session.stop();
        }
    }
}
