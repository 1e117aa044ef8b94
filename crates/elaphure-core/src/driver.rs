//! Async executor for session actions.
//!
//! [`SessionDriver`] owns one [`SessionMachine`] and carries out the actions
//! it returns: socket reads and writes, shared-region updates, signal
//! hand-offs and listener notifications. Any error ends the session through
//! the fail-stop path; a [`Shutdown`] request ends it silently.

use std::{collections::VecDeque, future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::watch,
};
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    handle::TransportHandle,
    listener::ProxyListener,
    region::{DATA_PAGE_SIZE, SharedRegion},
    session::{SessionAction, SessionMachine, SessionState},
    transport::Connector,
};

/// Host-initiated stop request.
///
/// Once triggered it stays triggered; a session observes it either while
/// suspended on any await point or right after the producer signal fires.
#[derive(Debug)]
pub struct Shutdown {
    requested: watch::Sender<bool>,
}

impl Shutdown {
    /// Create an untriggered request.
    pub fn new() -> Self {
        Self { requested: watch::Sender::new(false) }
    }

    /// Request the session to stop.
    pub fn trigger(&self) {
        self.requested.send_replace(true);
    }

    /// Whether a stop was requested.
    pub fn is_triggered(&self) -> bool {
        *self.requested.borrow()
    }

    /// Resolve once a stop is requested.
    pub async fn wait(&self) {
        let mut rx = self.requested.subscribe();
        // The sender lives in `self`, so this only returns once triggered.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    /// Host name or address literal
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl SessionTarget {
    /// Target `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

/// Drives one session to completion.
pub struct SessionDriver<R> {
    machine: SessionMachine,
    handle: TransportHandle<R>,
    listener: Arc<dyn ProxyListener>,
    shutdown: Arc<Shutdown>,
    io_timeout: Option<Duration>,
    state: watch::Sender<SessionState>,
    buffer: Vec<u8>,
}

impl<R: SharedRegion> SessionDriver<R> {
    /// Create a driver for a fresh session.
    pub fn new(
        handle: TransportHandle<R>,
        listener: Arc<dyn ProxyListener>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self::with_machine(SessionMachine::new(), handle, listener, shutdown)
    }

    /// Create a driver around an existing machine.
    pub fn with_machine(
        machine: SessionMachine,
        handle: TransportHandle<R>,
        listener: Arc<dyn ProxyListener>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        let state = watch::Sender::new(machine.state());
        Self {
            machine,
            handle,
            listener,
            shutdown,
            io_timeout: None,
            state,
            buffer: vec![0; DATA_PAGE_SIZE],
        }
    }

    /// Bound every wire read and write by `limit`.
    #[must_use]
    pub fn with_io_timeout(mut self, limit: Option<Duration>) -> Self {
        self.io_timeout = limit;
        self
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// Run the session until it fails or a stop is requested.
    ///
    /// Returns the final state, which is always `Closed`.
    pub async fn run<C: Connector>(
        &mut self,
        connector: &C,
        target: &SessionTarget,
    ) -> SessionState {
        let shutdown = Arc::clone(&self.shutdown);

        let outcome = tokio::select! {
            biased;
            () = shutdown.wait() => None,
            result = self.drive(connector, target) => Some(result),
        };

        // The stream was owned by `drive` and is closed by now.
        match outcome {
            None | Some(Ok(())) => self.halt(),
            Some(Err(err)) => self.fail(err),
        }

        self.publish();
        self.machine.state()
    }

    async fn drive<C: Connector>(
        &mut self,
        connector: &C,
        target: &SessionTarget,
    ) -> Result<(), SessionError> {
        self.machine.begin()?;
        self.publish();

        debug!(host = %target.host, port = target.port, "connecting");
        let mut stream = bounded(self.io_timeout, async {
            connector.connect(&target.host, target.port).await.map_err(SessionError::Connect)
        })
        .await?;

        let mut queue: VecDeque<SessionAction> = self.machine.connected()?.into();
        self.publish();

        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::Send(bytes) => {
                    write(&mut stream, &bytes, self.io_timeout).await?;
                },
                SessionAction::ReadExact(len) => {
                    let buffer = &mut self.buffer[..len];
                    read_exact(&mut stream, buffer, self.io_timeout).await?;
                    queue.extend(self.machine.receive(&self.buffer[..len])?);
                    self.publish();
                },
                SessionAction::ReadBurst => {
                    let len = read_burst(&mut stream, &mut self.buffer, self.io_timeout).await?;
                    queue.extend(self.machine.receive(&self.buffer[..len])?);
                    self.publish();
                },
                SessionAction::ClearDeviceInfo => {
                    self.handle.region().with_memory(|memory| memory.info.clear_device_info());
                },
                SessionAction::StoreInfo { id, payload } => {
                    debug!(field = %id, len = payload.len(), "device info");
                    self.handle.region().with_memory(|memory| memory.info.store(id, &payload));
                },
                SessionAction::MarkReady => {
                    self.handle.region().with_memory(|memory| memory.info.set_ready(true));
                },
                SessionAction::NotifyConnected(message) => {
                    info!(host = %target.host, port = target.port, "{message}");
                    self.listener.on_connect(&message);
                },
                SessionAction::AwaitProducer => {
                    let Some((command_count, data)) = self.await_producer().await? else {
                        return Ok(());
                    };
                    queue.extend(self.machine.produce(command_count, data)?);
                },
                SessionAction::Respond { status, payload } => {
                    self.handle
                        .region()
                        .with_memory(|memory| memory.consumer.store(status, &payload))?;
                    self.handle.consumer_ready().raise().map_err(SessionError::Signal)?;
                },
                SessionAction::Close { .. } => return Ok(()),
            }
        }

        Ok(())
    }

    /// Wait for a staged batch. `None` means a stop was requested.
    async fn await_producer(&self) -> Result<Option<(u32, Bytes)>, SessionError> {
        self.handle.producer_ready().wait().await.map_err(SessionError::Signal)?;

        if self.shutdown.is_triggered() {
            return Ok(None);
        }

        let (command_count, data) = self.handle.region().with_memory(|memory| {
            memory.producer.batch().map(|(count, data)| (count, Bytes::copy_from_slice(data)))
        })?;
        debug!(command_count, len = data.len(), "batch from producer");

        Ok(Some((command_count, data)))
    }

    fn halt(&mut self) {
        self.machine.halt();
        self.handle.region().with_memory(|memory| memory.info.set_ready(false));
        info!("session stopped");
    }

    fn fail(&mut self, err: SessionError) {
        for action in self.machine.close(err.to_string()) {
            if let SessionAction::Close { reason } = action {
                if let Err(signal_err) = self.handle.abort() {
                    warn!(error = %signal_err, "failed to wake producer");
                }
                warn!(%reason, "session closed");
                self.listener.on_disconnect(&reason);
            }
        }
    }

    fn publish(&self) {
        self.state.send_replace(self.machine.state());
    }
}

async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    match limit {
        Some(limit) => {
            tokio::time::timeout(limit, fut).await.map_err(|_| SessionError::Timeout(limit))?
        },
        None => fut.await,
    }
}

async fn write<S>(stream: &mut S, bytes: &[u8], limit: Option<Duration>) -> Result<(), SessionError>
where
    S: AsyncWrite + Unpin,
{
    bounded(limit, async {
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok::<_, SessionError>(())
    })
    .await
}

async fn read_exact<S>(
    stream: &mut S,
    buffer: &mut [u8],
    limit: Option<Duration>,
) -> Result<(), SessionError>
where
    S: AsyncRead + Unpin,
{
    bounded(limit, async {
        match stream.read_exact(buffer).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(SessionError::PeerClosed)
            },
            Err(err) => Err(SessionError::Io(err)),
        }
    })
    .await
}

/// One read; the peer is expected to deliver a whole burst at once.
async fn read_burst<S>(
    stream: &mut S,
    buffer: &mut [u8],
    limit: Option<Duration>,
) -> Result<usize, SessionError>
where
    S: AsyncRead + Unpin,
{
    bounded(limit, async {
        match stream.read(buffer).await {
            Ok(0) => Err(SessionError::PeerClosed),
            Ok(len) => Ok(len),
            Err(err) => Err(SessionError::Io(err)),
        }
    })
    .await
}
