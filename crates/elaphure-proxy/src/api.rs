//! Host-facing entry points.
//!
//! [`Proxy`] is what an embedding debugger talks to: initialize the
//! transport objects, start a session against a probe address, stop it and
//! tune a few runtime flags. Status codes follow the host's convention of
//! `0` for success and a negative value for failure; details reach the host
//! through the disconnect callback and the log.
//!
//! Callbacks run on the session worker and may call any method here: the
//! proxy lock is never held while a session starts or stops.

use std::sync::{Arc, Mutex, PoisonError};

use elaphure_core::{Listeners, ProxyListener, StatusCallback};
use tracing::{error, info, warn};

use crate::{
    config::ProxyConfig,
    connector::TcpConnector,
    error::ProxyError,
    manager::SessionManager,
    resources::ProxyResources,
    shm::MappedRegion,
};

/// Returned by [`Proxy::init`] when the transport objects cannot be created.
pub const INIT_FAILED: i32 = -1;

/// Returned by [`Proxy::start_with_address`] when no session could start.
pub const START_FAILED: i32 = -1;

struct Running {
    // Sessions must stop before the region unmaps.
    manager: SessionManager<MappedRegion, TcpConnector>,
    resources: ProxyResources,
}

/// The proxy as seen by its host.
pub struct Proxy {
    config: ProxyConfig,
    listeners: Arc<Listeners>,
    running: Mutex<Option<Arc<Running>>>,
}

impl Proxy {
    /// Proxy that has not acquired anything yet.
    pub fn new(config: ProxyConfig) -> Self {
        Self { config, listeners: Arc::new(Listeners::new()), running: Mutex::new(None) }
    }

    /// Active configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Create the shared region and signals. Repeated calls are no-ops.
    ///
    /// Returns `0` on success and [`INIT_FAILED`] otherwise.
    pub fn init(&self) -> i32 {
        match self.try_init() {
            Ok(()) => 0,
            Err(err) => {
                error!(error = %err, "proxy init failed");
                INIT_FAILED
            },
        }
    }

    /// Fallible form of [`Proxy::init`].
    pub fn try_init(&self) -> Result<(), ProxyError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Ok(());
        }

        let resources = ProxyResources::acquire(&self.config.names)?;
        let manager = SessionManager::new(
            resources.handle().clone(),
            TcpConnector::new(self.config.keepalive),
            Arc::clone(&self.listeners),
        )
        .with_io_timeout(self.config.io_timeout)
        .with_stop_grace(self.config.stop_grace);

        *running = Some(Arc::new(Running { manager, resources }));
        info!("proxy initialized");
        Ok(())
    }

    /// Start a session against `address` on the configured port.
    ///
    /// Initializes first if needed and replaces any running session.
    /// Blocks until the device info is stored and the session relays, or
    /// until setup fails. Returns `0` when the session is up and
    /// [`START_FAILED`] otherwise; a failed connect, handshake or info query
    /// also reaches the disconnect callback.
    pub fn start_with_address(&self, address: &str) -> i32 {
        match self.try_start_with_address(address) {
            Ok(()) => 0,
            Err(err) => {
                warn!(error = %err, address, "session start failed");
                START_FAILED
            },
        }
    }

    /// Fallible form of [`Proxy::start_with_address`].
    pub fn try_start_with_address(&self, address: &str) -> Result<(), ProxyError> {
        self.try_init()?;
        match self.current() {
            Some(running) => running.manager.start_with_address(address, self.config.port),
            None => Ok(()),
        }
    }

    /// Stop the running session. Safe to call at any time.
    pub fn stop(&self) {
        if let Some(running) = self.current() {
            running.manager.stop();
        }
    }

    /// Whether a session is relaying.
    pub fn is_running(&self) -> bool {
        self.current().is_some_and(|running| running.manager.is_running())
    }

    /// Replace the connect callback.
    pub fn set_on_connect(&self, callback: Option<StatusCallback>) {
        self.listeners.set_on_connect(callback);
    }

    /// Replace the disconnect callback.
    pub fn set_on_disconnect(&self, callback: Option<StatusCallback>) {
        self.listeners.set_on_disconnect(callback);
    }

    /// Add a listener next to the callbacks.
    pub fn add_listener(&self, listener: Arc<dyn ProxyListener>) {
        self.listeners.add(listener);
    }

    /// Allow or forbid vendor commands in the info page.
    ///
    /// Initializes first if needed. Returns `0` on success and
    /// [`INIT_FAILED`] when the region is unavailable.
    pub fn change_config(&self, enable_vendor_command: bool) -> i32 {
        if self.init() != 0 {
            return INIT_FAILED;
        }
        if let Some(running) = self.current() {
            running.resources.set_vendor_commands(enable_vendor_command);
        }
        0
    }

    /// Stop any session and release the shared objects.
    ///
    /// The objects go away once no in-progress call still uses them.
    pub fn release(&self) {
        let released = self.running.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(running) = released {
            running.manager.stop();
            drop(running);
            info!("proxy released");
        }
    }

    fn current(&self) -> Option<Arc<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for Proxy {
    fn default() -> Self {
        Self::new(ProxyConfig::default())
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.release();
    }
}
