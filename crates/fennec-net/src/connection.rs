//! One TCP connection: framing, serialized writes, background read loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError};

use fennec_packet::{Packet, XorCipher};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{ConnectionKind, NetError};

/// Largest frame the read loop will accept from the peer.
///
/// Anything bigger means a desynchronized stream or a hostile peer, not a
/// real payload — the connection is reported lost rather than buffering it.
const MAX_FRAME_LEN: u32 = 1 << 20;

/// A decoded unit of inbound traffic, delivered to the connection's owner.
#[derive(Debug)]
pub enum NetEvent {
    /// One complete frame, stripped of its length prefix.
    Frame {
        /// Which connection received it.
        kind: ConnectionKind,
        /// The payload, positioned at the opcode pair.
        packet: Packet,
    },

    /// The connection's read loop stopped because the peer went away.
    ///
    /// Not emitted for a locally requested [`Connection::close`].
    Closed {
        /// Which connection was lost.
        kind: ConnectionKind,
        /// Why.
        error: NetError,
    },
}

/// Shared state between the [`Connection`] handle and its read loop.
struct Shared {
    kind: ConnectionKind,
    peer: SocketAddr,
    open: AtomicBool,
    /// Server-issued rolling byte, echoed as the cipher offset on
    /// designated sends. Written by the dispatch path on handshake-ack
    /// and fingerprint-update frames.
    fingerprint: AtomicU8,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    cipher: Option<XorCipher>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// One TCP connection to a game endpoint.
///
/// Created open by [`Connection::connect`]; a background task reads
/// length-prefixed frames off the socket and forwards them as
/// [`NetEvent`]s on the owner's channel. Cloning the handle is cheap and
/// shares the underlying socket, so the heartbeat task and user commands
/// can hold the same connection.
///
/// Writes are serialized: each frame is composed into a single buffer and
/// written under a per-connection lock, so interleaved logical senders can
/// never corrupt a frame's byte stream.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Establishes a TCP connection and starts the read loop.
    ///
    /// Inbound frames and the eventual close notification arrive on
    /// `inbound`. `cipher` enables [`Connection::send_ciphered`]; pass
    /// `None` for connections that only carry plain frames.
    ///
    /// # Errors
    /// Returns [`NetError::ConnectFailed`] if the attempt cannot complete.
    pub async fn connect(
        kind: ConnectionKind,
        host: &str,
        port: u16,
        cipher: Option<XorCipher>,
        inbound: mpsc::UnboundedSender<NetEvent>,
    ) -> Result<Self, NetError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(NetError::ConnectFailed)?;
        let peer = stream.peer_addr().map_err(NetError::ConnectFailed)?;
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            kind,
            peer,
            open: AtomicBool::new(true),
            fingerprint: AtomicU8::new(0),
            writer: tokio::sync::Mutex::new(write_half),
            cipher,
            reader: std::sync::Mutex::new(None),
        });

        let task = tokio::spawn(read_loop(Arc::clone(&shared), read_half, inbound));
        *shared
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);

        tracing::info!(%kind, %peer, "connection established");
        Ok(Self { shared })
    }

    /// Tries an ordered list of ports against one host, returning the
    /// first connection that succeeds.
    ///
    /// # Errors
    /// Returns [`NetError::EndpointsExhausted`] once every port has been
    /// tried and failed.
    pub async fn connect_fallback(
        kind: ConnectionKind,
        host: &str,
        ports: &[u16],
        cipher: Option<XorCipher>,
        inbound: mpsc::UnboundedSender<NetEvent>,
    ) -> Result<Self, NetError> {
        for &port in ports {
            match Self::connect(kind, host, port, cipher.clone(), inbound.clone()).await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    tracing::warn!(%kind, host, port, error = %e, "endpoint refused, trying next");
                }
            }
        }
        Err(NetError::EndpointsExhausted(ports.len()))
    }

    /// Which endpoint this connection serves.
    pub fn kind(&self) -> ConnectionKind {
        self.shared.kind
    }

    /// The remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.shared.peer
    }

    /// Whether the connection is still open.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire)
    }

    /// The current rolling fingerprint byte.
    pub fn fingerprint(&self) -> u8 {
        self.shared.fingerprint.load(Ordering::Acquire)
    }

    /// Overwrites the fingerprint with a server-issued value.
    pub fn set_fingerprint(&self, value: u8) {
        self.shared.fingerprint.store(value, Ordering::Release);
    }

    /// Sends one frame in the clear.
    ///
    /// # Errors
    /// [`NetError::Closed`] if the connection was closed or replaced;
    /// [`NetError::SendFailed`] if the socket write fails.
    pub async fn send(&self, packet: &Packet) -> Result<(), NetError> {
        self.write_frame(packet.to_frame()).await
    }

    /// Ciphers the packet body, then sends it.
    ///
    /// The body (everything after the opcode pair) is XORed with the
    /// connection's cipher keyed at the current fingerprint, and the
    /// fingerprint advances by one. The length prefix covers the
    /// post-cipher payload.
    ///
    /// # Errors
    /// [`NetError::CipherUnavailable`] if the connection has no cipher,
    /// plus the errors of [`Connection::send`].
    pub async fn send_ciphered(&self, packet: &Packet) -> Result<(), NetError> {
        let cipher = self
            .shared
            .cipher
            .as_ref()
            .ok_or(NetError::CipherUnavailable)?;
        let offset = self.shared.fingerprint.fetch_add(1, Ordering::AcqRel);

        let mut ciphered = packet.clone();
        cipher.transform(ciphered.body_mut(), offset);
        self.write_frame(ciphered.to_frame()).await
    }

    async fn write_frame(&self, frame: Vec<u8>) -> Result<(), NetError> {
        if !self.is_open() {
            return Err(NetError::Closed);
        }
        let mut writer = self.shared.writer.lock().await;
        // Re-check under the lock: a close may have raced the first check.
        if !self.is_open() {
            return Err(NetError::Closed);
        }
        writer
            .write_all(&frame)
            .await
            .map_err(NetError::SendFailed)
    }

    /// Closes the connection. Idempotent and safe from any state.
    ///
    /// Stops the read loop, shuts the socket down, and fails any
    /// subsequent send with [`NetError::Closed`].
    pub async fn close(&self) {
        if !self.shared.open.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self
            .shared
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        let mut writer = self.shared.writer.lock().await;
        let _ = writer.shutdown().await;
        tracing::info!(kind = %self.shared.kind, peer = %self.shared.peer, "connection closed");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("kind", &self.shared.kind)
            .field("peer", &self.shared.peer)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Reads length-prefixed frames until EOF, error, or local close.
async fn read_loop(
    shared: Arc<Shared>,
    mut reader: OwnedReadHalf,
    inbound: mpsc::UnboundedSender<NetEvent>,
) {
    let kind = shared.kind;
    loop {
        let error = match read_frame(&mut reader).await {
            Ok(packet) => {
                tracing::trace!(%kind, len = packet.as_slice().len(), "frame received");
                if inbound.send(NetEvent::Frame { kind, packet }).is_err() {
                    // Owner dropped the receiver; nothing left to serve.
                    return;
                }
                continue;
            }
            Err(e) => e,
        };

        // A locally requested close aborts this task in most schedules;
        // if the socket error surfaces first, stay silent — the owner
        // asked for the shutdown and needs no report.
        if shared.open.swap(false, Ordering::AcqRel) {
            tracing::warn!(%kind, error = %error, "connection lost");
            let _ = inbound.send(NetEvent::Closed { kind, error });
        }
        return;
    }
}

/// Reads one `u32` length prefix and its payload.
async fn read_frame(reader: &mut OwnedReadHalf) -> Result<Packet, NetError> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(NetError::ConnectionLost)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(NetError::FrameTooLarge(len, MAX_FRAME_LEN));
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(NetError::ConnectionLost)?;
    Ok(Packet::from_bytes(&payload[..]))
}
