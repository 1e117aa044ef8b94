//! Scripted probe peer.
//!
//! Speaks the probe side of the link over any byte stream: answers the
//! handshake, the four device-info queries, then one scripted reply per
//! batch. Everything it receives is recorded in a shared [`ProbeLog`] as soon
//! as it arrives, so a test can inspect it even while the probe is still
//! running.

use std::{
    io,
    sync::{Arc, Mutex, PoisonError},
};

use bytes::Bytes;
use elaphure_proto::{
    COMMAND_HANDSHAKE, DapCommand, HandshakeResponse, InfoId, LINK_IDENTIFIER, PROXY_VERSION,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// What the probe does with one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Answer with these bytes in a single write
    Burst(Bytes),
    /// Never answer; keep the connection open until the proxy drops it
    Silent,
    /// Close the connection without answering
    Hangup,
}

/// Probe behaviour for one session.
#[derive(Debug, Clone)]
pub struct ProbeScript {
    handshake: HandshakeResponse,
    info: [Bytes; 4],
    replies: Vec<Reply>,
}

impl ProbeScript {
    /// A well-behaved probe with no batch replies scripted yet.
    pub fn new() -> Self {
        Self {
            handshake: HandshakeResponse::with_fields(
                LINK_IDENTIFIER,
                COMMAND_HANDSHAKE,
                PROXY_VERSION,
            ),
            info: [
                info_record(b"CMSIS-DAP elaphure"),
                info_record(b"E1A0001"),
                info_record(b"2.1.0"),
                info_record(&[0x13, 0x00]),
            ],
            replies: Vec::new(),
        }
    }

    /// Answer the handshake with these field values.
    #[must_use]
    pub fn handshake(mut self, identifier: u32, command: u32, version: u32) -> Self {
        self.handshake = HandshakeResponse::with_fields(identifier, command, version);
        self
    }

    /// Answer the query for `id` with this raw record.
    #[must_use]
    pub fn info(mut self, id: InfoId, record: impl Into<Bytes>) -> Self {
        let slot = InfoId::SEQUENCE.iter().position(|&candidate| candidate == id).unwrap_or(0);
        self.info[slot] = record.into();
        self
    }

    /// Queue a reply for the next batch.
    #[must_use]
    pub fn reply(mut self, reply: Reply) -> Self {
        self.replies.push(reply);
        self
    }

    /// Queue a burst reply for the next batch.
    #[must_use]
    pub fn burst(self, bytes: impl Into<Bytes>) -> Self {
        self.reply(Reply::Burst(bytes.into()))
    }
}

impl Default for ProbeScript {
    fn default() -> Self {
        Self::new()
    }
}

/// Well-formed `DAP_Info` answer carrying `payload`.
///
/// # Panics
/// If `payload` is longer than a length byte can describe.
#[allow(clippy::panic)]
pub fn info_record(payload: &[u8]) -> Bytes {
    let Ok(len) = u8::try_from(payload.len()) else {
        panic!("info payload of {} bytes", payload.len());
    };
    let mut record = Vec::with_capacity(payload.len() + 2);
    record.push(DapCommand::Info.to_u8());
    record.push(len);
    record.extend_from_slice(payload);
    Bytes::from(record)
}

/// Connection lifecycle as the probe saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Connection number `n` (1-based) was accepted
    Opened(usize),
    /// Connection number `n` ended
    Closed(usize),
}

/// Everything the probe received.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeLog {
    /// Handshake bytes, once received
    pub handshake: Option<Vec<u8>>,
    /// Device-info queries in arrival order
    pub queries: Vec<Vec<u8>>,
    /// Batches in arrival order, one entry per read
    pub batches: Vec<Vec<u8>>,
    /// Connections accepted
    pub connections: usize,
    /// Opens and closes in the order they happened
    pub timeline: Vec<LinkEvent>,
}

/// Probe peer driven by a [`ProbeScript`].
#[derive(Debug, Clone)]
pub struct MockProbe {
    script: ProbeScript,
    log: Arc<Mutex<ProbeLog>>,
}

impl MockProbe {
    /// Create a probe with a fresh log.
    pub fn new(script: ProbeScript) -> Self {
        Self { script, log: Arc::default() }
    }

    /// Snapshot of the log.
    pub fn log(&self) -> ProbeLog {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Serve one connection until either side hangs up.
    pub async fn serve<S>(&self, stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut number = 0;
        self.record(|log| {
            log.connections += 1;
            number = log.connections;
            log.timeline.push(LinkEvent::Opened(number));
        });

        let result = self.exchange(stream).await;
        self.record(|log| log.timeline.push(LinkEvent::Closed(number)));
        result
    }

    async fn exchange<S>(&self, mut stream: S) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {

        let mut hello = [0u8; HandshakeResponse::SIZE];
        if !read_exact_or_eof(&mut stream, &mut hello).await? {
            return Ok(());
        }
        self.record(|log| log.handshake = Some(hello.to_vec()));
        stream.write_all(&self.script.handshake.to_bytes()).await?;

        if self.script.handshake.identifier() != LINK_IDENTIFIER {
            debug!("probe sent a foreign identifier, waiting for hang-up");
            return drain(&mut stream).await;
        }

        for answer in &self.script.info {
            let mut query = [0u8; 2];
            if !read_exact_or_eof(&mut stream, &mut query).await? {
                return Ok(());
            }
            self.record(|log| log.queries.push(query.to_vec()));
            stream.write_all(answer).await?;
        }

        let mut buffer = vec![0u8; 64 * 1024];
        let mut replies = self.script.replies.iter();
        loop {
            let len = match stream.read(&mut buffer).await {
                Ok(0) => return Ok(()),
                Ok(len) => len,
                Err(err) if is_hangup(&err) => return Ok(()),
                Err(err) => return Err(err),
            };
            self.record(|log| log.batches.push(buffer[..len].to_vec()));

            match replies.next() {
                Some(Reply::Burst(bytes)) => stream.write_all(bytes).await?,
                Some(Reply::Silent) => return drain(&mut stream).await,
                Some(Reply::Hangup) | None => return Ok(()),
            }
        }
    }

    fn record(&self, f: impl FnOnce(&mut ProbeLog)) {
        f(&mut self.log.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

async fn read_exact_or_eof<S>(stream: &mut S, buffer: &mut [u8]) -> io::Result<bool>
where
    S: AsyncRead + Unpin,
{
    match stream.read_exact(buffer).await {
        Ok(_) => Ok(true),
        Err(err) if is_hangup(&err) => Ok(false),
        Err(err) => Err(err),
    }
}

async fn drain<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut sink = [0u8; 256];
    loop {
        match stream.read(&mut sink).await {
            Ok(0) => return Ok(()),
            Ok(_) => {},
            Err(err) if is_hangup(&err) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

fn is_hangup(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
