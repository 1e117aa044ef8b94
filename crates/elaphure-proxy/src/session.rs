//! Network session on a dedicated worker thread.
//!
//! The session's event loop runs on its own thread with a current-thread
//! Tokio runtime. [`NetworkSession::start`] blocks the caller until setup
//! has a definitive outcome: the connect callback after the device info is
//! stored, or the disconnect callback after connect, handshake or info query
//! failed. [`NetworkSession::stop`] may be called from any thread at any
//! time, including from inside a callback.

use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use elaphure_core::{
    Connector, ProxyListener, SessionDriver, SessionState, SessionTarget, SharedRegion,
    Shutdown, TransportHandle,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ProxyError;

/// Connect outcome handed from the worker to the caller of `start`.
#[derive(Default)]
struct StartupGate {
    connected: Mutex<Option<bool>>,
    decided: Condvar,
}

impl StartupGate {
    /// Record the outcome. Only the first call counts.
    fn open(&self, connected: bool) {
        let mut outcome = self.connected.lock().unwrap_or_else(PoisonError::into_inner);
        if outcome.is_none() {
            *outcome = Some(connected);
            self.decided.notify_all();
        }
    }

    fn wait(&self) -> bool {
        let outcome = self.connected.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = self
            .decided
            .wait_while(outcome, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        outcome.unwrap_or(false)
    }
}

/// Forwards notifications, then reports the first one through a
/// [`StartupGate`].
struct GatedListener {
    inner: Arc<dyn ProxyListener>,
    gate: Arc<StartupGate>,
}

impl ProxyListener for GatedListener {
    fn on_connect(&self, message: &str) {
        self.inner.on_connect(message);
        self.gate.open(true);
    }

    fn on_disconnect(&self, message: &str) {
        self.inner.on_disconnect(message);
        self.gate.open(false);
    }
}

/// A running session.
pub struct NetworkSession<R: SharedRegion> {
    handle: TransportHandle<R>,
    shutdown: Arc<Shutdown>,
    state: watch::Receiver<SessionState>,
    worker: Option<JoinHandle<()>>,
    target: SessionTarget,
}

impl<R: SharedRegion> NetworkSession<R> {
    /// Spawn the worker and wait until the session is ready or has failed.
    ///
    /// A failed setup is reported to `listener` first and then returned as
    /// `SetupFailed`. The caller must not hold any lock that `listener`
    /// may take.
    pub fn start<C: Connector>(
        handle: TransportHandle<R>,
        connector: C,
        target: SessionTarget,
        listener: Arc<dyn ProxyListener>,
        io_timeout: Option<Duration>,
    ) -> Result<Self, ProxyError> {
        let shutdown = Arc::new(Shutdown::new());
        let gate = Arc::new(StartupGate::default());
        let listener = Arc::new(GatedListener { inner: listener, gate: Arc::clone(&gate) });
        let mut driver = SessionDriver::new(handle.clone(), listener, Arc::clone(&shutdown))
            .with_io_timeout(io_timeout);
        let state = driver.subscribe();

        let worker = {
            let gate = Arc::clone(&gate);
            let target = target.clone();
            thread::Builder::new()
                .name("elaphure-session".to_string())
                .spawn(move || {
                    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                        Ok(runtime) => {
                            let final_state = runtime.block_on(driver.run(&connector, &target));
                            debug!(?final_state, "session worker finished");
                        },
                        Err(err) => warn!(error = %err, "failed to build session runtime"),
                    }
                    // No-op unless setup ended without a notification.
                    gate.open(false);
                })
                .map_err(ProxyError::Spawn)?
        };

        let mut session =
            Self { handle, shutdown, state, worker: Some(worker), target: target.clone() };

        if !gate.wait() {
            session.join();
            return Err(ProxyError::SetupFailed {
                target: format!("{}:{}", target.host, target.port),
            });
        }

        info!(host = %target.host, port = target.port, "session started");
        Ok(session)
    }

    /// Current state of the session.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Whether the session is relaying batches.
    pub fn is_relaying(&self) -> bool {
        self.state() == SessionState::Relaying
    }

    /// Target the session was started against.
    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    /// Force the session down.
    ///
    /// Does not wait for an in-flight round trip: the socket is closed as
    /// soon as the worker observes the stop. Afterwards the ready flag is
    /// clear, the consumer status is invalid and the consumer signal has
    /// been raised once more. The disconnect callback does not fire.
    /// Calling it again is a no-op.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shutdown.trigger();
        // A callback stopping its own session cannot wait for itself; the
        // worker exits once the callback returns.
        if worker.thread().id() != thread::current().id() && worker.join().is_err() {
            warn!("session worker panicked");
        }

        if let Err(err) = self.handle.abort() {
            warn!(error = %err, "failed to wake producer after stop");
        }
        info!(host = %self.target.host, port = self.target.port, "session stopped");
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("session worker panicked");
            }
        }
    }
}

impl<R: SharedRegion> Drop for NetworkSession<R> {
    fn drop(&mut self) {
        self.stop();
    }
}
