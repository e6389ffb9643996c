use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProtoError;
use crate::header::{FrameHeader, FrameType, PROTOCOL_VERSION};
use crate::message::ControlMessage;

/// Largest payload this transport accepts. A `client_dir_list` batch of a
/// few thousand paths fits comfortably under this; anything larger almost
/// certainly means a desynced peer.
pub const MAX_FRAME_LENGTH: u32 = 16 * 1024 * 1024;

/// Opaque identifier assigned by the coordinator to each accepted worker
/// connection, monotonically increasing.
pub type ClientId = u64;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SEQ_ID: AtomicU16 = AtomicU16::new(0);

fn next_seq_id() -> u16 {
    NEXT_SEQ_ID.fetch_add(1, Ordering::Relaxed)
}

async fn write_frame(
    writer: &mut OwnedWriteHalf,
    msg: &ControlMessage,
) -> Result<(), ProtoError> {
    let payload = bincode::serialize(msg)?;
    if payload.len() as u64 > MAX_FRAME_LENGTH as u64 {
        return Err(ProtoError::FrameTooLarge(payload.len() as u32));
    }
    let header = FrameHeader::new(FrameType::Data, payload.len() as u32, next_seq_id());
    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(&payload).await?;
    Ok(())
}

/// Outcome of reading one frame off the wire.
enum FrameOutcome {
    Message(ControlMessage),
    /// Keepalive frame, carries no payload; the caller should loop and read
    /// the next frame.
    Heartbeat,
    /// Peer closed cleanly before sending another header.
    Eof,
}

async fn read_frame(reader: &mut OwnedReadHalf) -> Result<FrameOutcome, ProtoError> {
    let mut header_buf = [0u8; FrameHeader::SIZE];
    match reader.read_exact(&mut header_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(FrameOutcome::Eof),
        Err(e) => return Err(e.into()),
    }

    let header = FrameHeader::from_bytes(&header_buf);
    if !header.is_valid() {
        return Err(ProtoError::BadMagic);
    }
    if header.version() != PROTOCOL_VERSION {
        return Err(ProtoError::UnsupportedVersion(header.version()));
    }
    if header.length > MAX_FRAME_LENGTH {
        return Err(ProtoError::FrameTooLarge(header.length));
    }

    match header.frame_type() {
        Some(FrameType::Heartbeat) => Ok(FrameOutcome::Heartbeat),
        _ => {
            let mut payload = vec![0u8; header.length as usize];
            reader.read_exact(&mut payload).await?;
            let msg: ControlMessage = bincode::deserialize(&payload)?;
            Ok(FrameOutcome::Message(msg))
        }
    }
}

async fn writer_task(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<ControlMessage>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            warn!(error = %e, "frame write failed, dropping connection");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

async fn reader_task(mut reader: OwnedReadHalf, tx: mpsc::Sender<ControlMessage>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(FrameOutcome::Message(msg)) => {
                if tx.send(msg).await.is_err() {
                    return;
                }
            }
            Ok(FrameOutcome::Heartbeat) => continue,
            Ok(FrameOutcome::Eof) => {
                debug!("peer closed cleanly");
                let _ = tx.send(ControlMessage::Closed).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "frame read failed");
                let _ = tx.send(ControlMessage::Closed).await;
                return;
            }
        }
    }
}

/// One framed, bidirectional connection. Sends are a non-blocking enqueue
/// onto a background writer task; `recv` yields the next message, or a
/// synthetic [`ControlMessage::Closed`] exactly once when the peer goes
/// away, after which it always returns `None`.
pub struct Connection {
    send_tx: Option<mpsc::UnboundedSender<ControlMessage>>,
    recv_rx: mpsc::Receiver<ControlMessage>,
    writer_handle: JoinHandle<()>,
    delivered_closed: bool,
}

impl Connection {
    fn from_stream(stream: TcpStream) -> Self {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let (send_tx, send_rx) = mpsc::unbounded_channel::<ControlMessage>();
        let writer_handle = tokio::spawn(writer_task(write_half, send_rx));

        let (recv_tx, recv_rx) = mpsc::channel::<ControlMessage>(64);
        tokio::spawn(reader_task(read_half, recv_tx));

        Self {
            send_tx: Some(send_tx),
            recv_rx,
            writer_handle,
            delivered_closed: false,
        }
    }

    /// Dial out to `addr` (worker side). There is no handshake at this
    /// layer; callers that need one exchange an ordinary `ControlMessage`
    /// after connecting.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProtoError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(stream))
    }

    /// Non-blocking enqueue into the per-connection send buffer.
    pub fn send(&self, msg: ControlMessage) -> Result<(), ProtoError> {
        match &self.send_tx {
            Some(tx) => tx.send(msg).map_err(|_| ProtoError::Closed),
            None => Err(ProtoError::Closed),
        }
    }

    /// Returns the next framed message, or `None` once the peer has closed
    /// and the synthetic `Closed` message has already been delivered.
    pub async fn recv(&mut self) -> Option<ControlMessage> {
        if self.delivered_closed {
            return None;
        }
        match self.recv_rx.recv().await {
            Some(ControlMessage::Closed) => {
                self.delivered_closed = true;
                Some(ControlMessage::Closed)
            }
            Some(msg) => Some(msg),
            None => {
                self.delivered_closed = true;
                Some(ControlMessage::Closed)
            }
        }
    }

    /// Flushes pending sends up to `deadline`, then shuts the connection
    /// down. Messages still queued after the deadline are abandoned.
    pub async fn close(&mut self, deadline: Duration) {
        // Dropping the sender lets the writer task drain its backlog and
        // exit on its own once the channel is empty.
        self.send_tx.take();
        if tokio::time::timeout(deadline, &mut self.writer_handle)
            .await
            .is_err()
        {
            warn!("connection close deadline exceeded, abandoning writer");
            self.writer_handle.abort();
        }
    }
}

/// TCP listener accepting worker connections (coordinator side).
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, ProtoError> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }

    /// Accepts the next worker connection, assigning it a fresh monotonic
    /// [`ClientId`].
    pub async fn accept(&self) -> Result<(Connection, ClientId), ProtoError> {
        let (stream, _addr) = self.inner.accept().await?;
        let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
        Ok((Connection::from_stream(stream), id))
    }
}
