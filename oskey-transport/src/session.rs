//! Serial transport session
//!
//! A [`TransportSession`] owns one physical connection at a time:
//!
//! ```text
//!   Disconnected ──connect()──▶ Connecting ──port open──▶ Reading
//!        ▲                          │                        │
//!        └──────── teardown ◀── Closing ◀──close()/EOF/error─┘
//! ```
//!
//! While `Reading`, a detached read loop feeds raw chunks into a
//! [`Reassembler`] and hands every decoded [`ResData`] to the registered
//! message handler, in wire order. The loop never returns errors to anyone; a
//! failed read shows up as the transition to `Disconnected`.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use oskey_core::constants::{MAX_PAYLOAD, WRITE_CHUNK_SIZE};
use oskey_core::{frame, Reassembler, ReqData, ResData};

use crate::{
    config::PortConfig,
    error::{Error, Result},
    SerialHost, SerialPort,
};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Reading,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Reading => "reading",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

type MessageHandler = Box<dyn Fn(ResData) + Send + Sync>;
type StateHandler = Box<dyn Fn(ConnectionState) + Send + Sync>;

struct ReaderTask {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    host: Arc<dyn SerialHost>,
    config: PortConfig,
    state: Mutex<ConnectionState>,
    writer: tokio::sync::Mutex<Option<WriteHalf<Box<dyn SerialPort>>>>,
    /// Wakes a `send` stuck on a stalled port when teardown starts
    closing: Notify,
    reader: Mutex<Option<ReaderTask>>,
    reassembler: Mutex<Reassembler>,
    on_message: RwLock<Option<MessageHandler>>,
    on_state: RwLock<Option<StateHandler>>,
}

impl Inner {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Record a transition and notify the state handler once per change
    fn set_state(&self, next: ConnectionState) {
        {
            let mut state = self.state.lock();
            if *state == next {
                return;
            }
            debug!(from = %*state, to = %next, "Connection state");
            *state = next;
        }

        if let Some(handler) = self.on_state.read().as_ref() {
            handler(next);
        }
    }

    fn dispatch(&self, message: ResData) {
        trace!(kind = message.kind(), "Dispatching message");
        match self.on_message.read().as_ref() {
            Some(handler) => handler(message),
            None => debug!(kind = message.kind(), "No message handler registered, dropping"),
        }
    }

    /// Release the writer, clear buffered bytes and mark the session closed
    async fn teardown(&self) {
        if self.state() == ConnectionState::Reading {
            self.set_state(ConnectionState::Closing);
        }
        self.closing.notify_waiters();

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Writer shutdown failed");
            }
        }

        self.reassembler.lock().reset();
        self.set_state(ConnectionState::Disconnected);
    }
}

/// Serial transport session
///
/// Cheap to clone; clones share the same connection.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use oskey_core::ReqData;
/// use oskey_transport::{PortConfig, SerialHost, TransportSession};
///
/// # async fn run(host: Arc<dyn SerialHost>) -> oskey_transport::Result<()> {
/// let session = TransportSession::new(host, PortConfig::default());
/// session.on_message(|message| println!("received {}", message));
///
/// session.connect().await?;
/// session.send_request(&ReqData::version()).await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TransportSession {
    inner: Arc<Inner>,
}

impl TransportSession {
    /// Create a disconnected session
    pub fn new(host: Arc<dyn SerialHost>, config: PortConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                writer: tokio::sync::Mutex::new(None),
                closing: Notify::new(),
                reader: Mutex::new(None),
                reassembler: Mutex::new(Reassembler::new()),
                on_message: RwLock::new(None),
                on_state: RwLock::new(None),
            }),
        }
    }

    /// Register the message handler, replacing any previous one
    ///
    /// The handler runs on the read loop; it must not block.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(ResData) + Send + Sync + 'static,
    {
        *self.inner.on_message.write() = Some(Box::new(handler));
    }

    /// Register the state handler, replacing any previous one
    pub fn on_state<F>(&self, handler: F)
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        *self.inner.on_state.write() = Some(Box::new(handler));
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Check if the read loop is running
    pub fn is_reading(&self) -> bool {
        self.state() == ConnectionState::Reading
    }

    pub fn config(&self) -> &PortConfig {
        &self.inner.config
    }

    /// Bytes received but not yet part of a complete frame
    pub fn buffered(&self) -> usize {
        self.inner.reassembler.lock().buffered()
    }

    /// Open a port and start reading
    ///
    /// Any previous connection is closed first.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportUnavailable`] if the host has no serial support
    /// - any error from the host while selecting or opening the port
    pub async fn connect(&self) -> Result<()> {
        if !self.inner.host.is_available() {
            return Err(Error::TransportUnavailable);
        }

        self.close().await?;
        self.inner.set_state(ConnectionState::Connecting);

        let port = match self.inner.host.request_port(&self.inner.config).await {
            Ok(port) => port,
            Err(e) => {
                warn!(error = %e, "Failed to open serial port");
                self.inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        if self.state() != ConnectionState::Connecting {
            debug!("Session closed while the port was opening");
            return Err(Error::ConnectionClosed);
        }

        let (reader, writer) = tokio::io::split(port);
        self.inner.reassembler.lock().reset();
        *self.inner.writer.lock().await = Some(writer);

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.inner.set_state(ConnectionState::Reading);
        let handle = tokio::spawn(read_loop(Arc::clone(&self.inner), reader, cancel_rx));
        *self.inner.reader.lock() = Some(ReaderTask {
            cancel: cancel_tx,
            handle,
        });

        info!(
            baud_rate = self.inner.config.baud_rate,
            "Serial port open"
        );

        Ok(())
    }

    /// Stop reading and release the port
    ///
    /// Closing a closed session is a no-op.
    pub async fn close(&self) -> Result<()> {
        let task = self.inner.reader.lock().take();
        let state = self.state();

        if task.is_none() && state == ConnectionState::Disconnected {
            return Ok(());
        }

        if state != ConnectionState::Disconnected {
            debug!("Closing serial port...");
            self.inner.set_state(ConnectionState::Closing);
        }

        match task {
            Some(task) => {
                let _ = task.cancel.send(());
                if let Err(e) = task.handle.await {
                    error!(error = %e, "Read loop panicked");
                    self.inner.teardown().await;
                }
            }
            None => self.inner.teardown().await,
        }

        Ok(())
    }

    /// Stop reading without waiting for the port to be released
    ///
    /// The read loop finishes the teardown in the background. Used where
    /// `close` cannot be awaited, such as in `Drop`.
    pub fn abort(&self) {
        let Some(task) = self.inner.reader.lock().take() else {
            return;
        };

        debug!("Aborting serial session");
        if task.cancel.send(()).is_err() {
            // Read loop already gone; drop the writer if nobody holds it
            if let Ok(mut writer) = self.inner.writer.try_lock() {
                writer.take();
            }
        }
    }

    /// Frame `message` and write it to the port in small chunks
    ///
    /// Callers must not overlap `send` calls.
    ///
    /// # Errors
    ///
    /// - [`Error::NotWritable`] if no port is open
    /// - [`Error::MessageTooLarge`] if `message` exceeds [`MAX_PAYLOAD`]
    /// - [`Error::ConnectionClosed`] if the session closes mid-write
    /// - [`Error::Io`] if the write fails; the session is closed
    pub async fn send(&self, message: &[u8]) -> Result<()> {
        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::NotWritable)?;

        if message.len() > MAX_PAYLOAD {
            return Err(Error::MessageTooLarge {
                size: message.len(),
                max: MAX_PAYLOAD,
            });
        }

        let encoded = frame::encode(message)?;

        let closing = self.inner.closing.notified();
        tokio::pin!(closing);
        closing.as_mut().enable();
        if self.state() != ConnectionState::Reading {
            return Err(Error::ConnectionClosed);
        }

        let result = tokio::select! {
            _ = &mut closing => {
                debug!("Write abandoned, session closing");
                return Err(Error::ConnectionClosed);
            }
            result = write_chunked(writer, &encoded) => result,
        };
        drop(guard);

        match result {
            Ok(()) => {
                trace!("Sent {} bytes: {:02X?}", encoded.len(), &encoded[..encoded.len().min(16)]);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Write port error");
                self.close().await?;
                Err(Error::Io(e))
            }
        }
    }

    /// Serialize and send an application request
    pub async fn send_request(&self, request: &ReqData) -> Result<()> {
        use prost::Message;

        debug!(kind = request.kind(), "Sending request");
        self.send(&request.encode_to_vec()).await
    }
}

async fn write_chunked<W>(writer: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for chunk in data.chunks(WRITE_CHUNK_SIZE) {
        writer.write_all(chunk).await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn read_loop<R>(inner: Arc<Inner>, mut reader: ReadHalf<R>, mut cancel: oneshot::Receiver<()>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; inner.config.read_buffer];

    loop {
        let n = tokio::select! {
            _ = &mut cancel => {
                debug!("Read loop cancelled");
                break;
            }
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    info!("Serial stream ended");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "Read port error");
                    break;
                }
            }
        };

        trace!("Received {} bytes: {:02X?}", n, &chunk[..n.min(16)]);

        let frames = inner.reassembler.lock().feed(&chunk[..n]);
        for payload in frames {
            match ResData::from_payload(&payload) {
                Ok(message) => inner.dispatch(message),
                Err(e) => warn!(error = %e, len = payload.len(), "Dropping undecodable frame"),
            }
        }
    }

    drop(reader);
    inner.teardown().await;
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .finish()
    }
}
