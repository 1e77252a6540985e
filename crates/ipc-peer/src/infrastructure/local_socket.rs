//! Unix domain socket transport adapter.
//!
//! [`LocalSocket`] implements [`Transport`] on top of a non-blocking
//! `tokio::net::UnixStream`.  The `Connection` that owns it is synchronous,
//! so the adapter splits the work in two:
//!
//! - **Synchronous calls** (`write`, `read_available`) use `try_write` /
//!   `try_read` and never wait.
//! - **Background tasks** wait for socket readiness and post
//!   [`TransportEvent`]s to the run loop's channel.  They never touch
//!   connection state.
//!
//! # Readiness handshake (for beginners)
//!
//! ```text
//!  watcher task                         run loop
//!  ────────────                         ────────
//!  readable().await
//!  post Readable  ────────────────────► handle_event(Readable)
//!  ack.notified().await                   └─ read_available()  (drains to WouldBlock)
//!        ◄──────────────────────────────────── ack.notify_one()
//!  readable().await
//! ```
//!
//! The watcher waits for the acknowledgement so that one burst of inbound
//! data produces one `Readable` event instead of a flood.
//!
//! Writes use the mirror image.  A short `write` notifies a long-lived write
//! watcher, which waits for `writable()` and posts `BytesWritten(0)` so the
//! connection flushes again.  `Notify` keeps one permit, so a request made
//! while the watcher is still posting the previous signal is not lost.
//!
//! # Endpoint names
//!
//! A name containing a path separator is used as a filesystem path as-is.
//! A bare name such as `ipc-peer.sock` is placed in the system temp
//! directory, see [`resolve_endpoint`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use ipc_core::{
    Generation, Transport, TransportError, TransportErrorCode, TransportEvent,
    TransportEventKind, TransportFactory,
};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::PeerError;

/// Bytes requested per `try_read` call.
const READ_CHUNK: usize = 4096;

/// Maps an endpoint name to the socket path it denotes.
pub fn resolve_endpoint(name: &str) -> PathBuf {
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        PathBuf::from(name)
    } else {
        std::env::temp_dir().join(name)
    }
}

// ── Transport handle ──────────────────────────────────────────────────────────

/// One Unix socket handle, tagged with the generation it reports under.
pub struct LocalSocket {
    generation: Generation,
    events: mpsc::UnboundedSender<TransportEvent>,
    /// Filled once the stream is connected (or adopted).
    stream: Arc<OnceLock<UnixStream>>,
    read_ack: Arc<Notify>,
    write_wanted: Arc<Notify>,
    tasks: Vec<JoinHandle<()>>,
    write_watch: Option<JoinHandle<()>>,
    eof: bool,
}

impl LocalSocket {
    /// Creates an unconnected handle.  Call [`Transport::connect_to`] next.
    pub fn new(generation: Generation, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            generation,
            events,
            stream: Arc::new(OnceLock::new()),
            read_ack: Arc::new(Notify::new()),
            write_wanted: Arc::new(Notify::new()),
            tasks: Vec::new(),
            write_watch: None,
            eof: false,
        }
    }

    /// Wraps a stream that is already connected, such as one returned by
    /// [`LocalSocketListener::accept`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream(
        stream: UnixStream,
        generation: Generation,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let mut socket = Self::new(generation, events);
        // A fresh OnceLock cannot already be set.
        let _ = socket.stream.set(stream);
        let watcher = tokio::spawn(watch_readable(
            Arc::clone(&socket.stream),
            socket.generation,
            socket.events.clone(),
            Arc::clone(&socket.read_ack),
        ));
        socket.tasks.push(watcher);
        socket
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_connected(&self) -> bool {
        self.stream.get().is_some()
    }

    fn post(&self, kind: TransportEventKind) {
        post(&self.events, self.generation, kind);
    }

    /// Asks the write watcher for one `BytesWritten(0)` once the socket can
    /// take more bytes, starting the watcher on first use.
    fn request_writable(&mut self) {
        if self.write_watch.is_none() {
            self.write_watch = Some(tokio::spawn(watch_writable(
                Arc::clone(&self.stream),
                self.generation,
                self.events.clone(),
                Arc::clone(&self.write_wanted),
            )));
        }
        self.write_wanted.notify_one();
    }
}

impl Transport for LocalSocket {
    fn connect_to(&mut self, endpoint: &str) {
        let path = resolve_endpoint(endpoint);
        let slot = Arc::clone(&self.stream);
        let events = self.events.clone();
        let ack = Arc::clone(&self.read_ack);
        let generation = self.generation;

        let task = tokio::spawn(async move {
            match UnixStream::connect(&path).await {
                Ok(stream) => {
                    debug!(%generation, path = %path.display(), "socket connected");
                    let _ = slot.set(stream);
                    post(&events, generation, TransportEventKind::Connected);
                    watch_readable(slot, generation, events, ack).await;
                }
                Err(e) => {
                    warn!(%generation, path = %path.display(), error = %e, "socket connect failed");
                    post(&events, generation, error_kind(&e));
                }
            }
        });
        self.tasks.push(task);
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let stream = self.stream.get().ok_or(TransportError::NotConnected)?;
        let written = match stream.try_write(bytes) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
            Err(e) => return Err(e.into()),
        };
        trace!(generation = %self.generation, written, offered = bytes.len(), "socket write");

        // The kernel owns accepted bytes, so they count as written right away.
        if written > 0 {
            self.post(TransportEventKind::BytesWritten(written));
        }
        if written < bytes.len() {
            self.request_writable();
        }
        Ok(written)
    }

    fn read_available(&mut self) -> Vec<u8> {
        let mut data = Vec::new();
        let Some(stream) = self.stream.get() else {
            return data;
        };
        if self.eof {
            return data;
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match stream.try_read(&mut chunk) {
                Ok(0) => {
                    debug!(generation = %self.generation, "peer closed the socket");
                    self.eof = true;
                    self.post(TransportEventKind::Disconnected);
                    // No ack: the watcher stays parked until the handle drops.
                    return data;
                }
                Ok(n) => data.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(generation = %self.generation, error = %e, "socket read failed");
                    self.post(error_kind(&e));
                    return data;
                }
            }
        }

        self.read_ack.notify_one();
        data
    }
}

impl Drop for LocalSocket {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(watch) = self.write_watch.take() {
            watch.abort();
        }
    }
}

impl std::fmt::Debug for LocalSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSocket")
            .field("generation", &self.generation)
            .field("connected", &self.is_connected())
            .field("eof", &self.eof)
            .finish()
    }
}

async fn watch_readable(
    slot: Arc<OnceLock<UnixStream>>,
    generation: Generation,
    events: mpsc::UnboundedSender<TransportEvent>,
    ack: Arc<Notify>,
) {
    let Some(stream) = slot.get() else {
        return;
    };
    loop {
        if let Err(e) = stream.readable().await {
            post(&events, generation, error_kind(&e));
            return;
        }
        if events
            .send(TransportEvent::new(generation, TransportEventKind::Readable))
            .is_err()
        {
            return;
        }
        ack.notified().await;
    }
}

async fn watch_writable(
    slot: Arc<OnceLock<UnixStream>>,
    generation: Generation,
    events: mpsc::UnboundedSender<TransportEvent>,
    wanted: Arc<Notify>,
) {
    let Some(stream) = slot.get() else {
        return;
    };
    loop {
        wanted.notified().await;
        if let Err(e) = stream.writable().await {
            post(&events, generation, error_kind(&e));
            return;
        }
        if events
            .send(TransportEvent::new(generation, TransportEventKind::BytesWritten(0)))
            .is_err()
        {
            return;
        }
    }
}

fn post(
    events: &mpsc::UnboundedSender<TransportEvent>,
    generation: Generation,
    kind: TransportEventKind,
) {
    if events.send(TransportEvent::new(generation, kind)).is_err() {
        trace!(%generation, ?kind, "run loop gone; dropping transport event");
    }
}

fn error_kind(error: &io::Error) -> TransportEventKind {
    TransportEventKind::Error(TransportErrorCode::from_io_kind(error.kind()))
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Opens [`LocalSocket`]s that all post to one run loop channel.
#[derive(Debug, Clone)]
pub struct LocalSocketFactory {
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl LocalSocketFactory {
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { events }
    }

    /// Sender that adopted streams should post to.
    pub fn events(&self) -> &mpsc::UnboundedSender<TransportEvent> {
        &self.events
    }
}

impl TransportFactory for LocalSocketFactory {
    type Transport = LocalSocket;

    fn open(&mut self, generation: Generation) -> LocalSocket {
        LocalSocket::new(generation, self.events.clone())
    }
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// A bound Unix socket that removes its file when dropped.
#[derive(Debug)]
pub struct LocalSocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl LocalSocketListener {
    /// Binds `endpoint`, replacing a stale socket file left by a previous run.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Bind`] when the stale file cannot be removed or
    /// the socket cannot be bound.
    pub fn bind(endpoint: &str) -> Result<Self, PeerError> {
        let path = resolve_endpoint(endpoint);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(PeerError::Bind { path, source }),
        }
        let listener = UnixListener::bind(&path).map_err(|source| PeerError::Bind {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "listening");
        Ok(Self { listener, path })
    }

    /// Waits for the next inbound connection.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Accept`] when the OS rejects the accept.
    pub async fn accept(&self) -> Result<UnixStream, PeerError> {
        let (stream, _addr) = self.listener.accept().await.map_err(PeerError::Accept)?;
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalSocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
