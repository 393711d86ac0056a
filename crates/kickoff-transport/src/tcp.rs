//! Plain TCP transport carrying length-prefixed frames.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};

use crate::framing::{self, MAX_FRAME_SIZE};
use crate::{
    wait_closed, Connection, ConnectionId, ConnectionSlots, SlotLease, Transport,
    TransportError,
};

/// A TCP [`Transport`] that listens for incoming connections.
pub struct TcpTransport {
    listener: TcpListener,
    slots: ConnectionSlots,
    max_frame_size: usize,
    shut_down: AtomicBool,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            slots: ConnectionSlots::new(),
            max_frame_size: MAX_FRAME_SIZE,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Sets the largest frame accepted or sent by connections from now on.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The slot arena issuing this transport's connection ids.
    pub fn slots(&self) -> &ConnectionSlots {
        &self.slots
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }

        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "could not set TCP_NODELAY");
        }

        let lease = self.slots.acquire();
        let id = lease.id();
        tracing::debug!(%id, %peer, "accepted TCP connection");

        let (read_half, write_half) = stream.into_split();
        let (closed, _) = watch::channel(false);
        Ok(TcpConnection {
            lease,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
            closed,
            max_frame_size: self.max_frame_size,
        })
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.shut_down.store(true, Ordering::Release);
        Ok(())
    }
}

/// A single TCP connection.
///
/// Read and write halves are locked independently, so a task blocked in
/// `recv` never holds up outbound traffic.
pub struct TcpConnection {
    lease: SlotLease,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
    max_frame_size: usize,
}

impl Connection for TcpConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let is_closed = *self.closed.borrow();
        if is_closed {
            return Err(TransportError::ConnectionClosed(format!(
                "{} already closed",
                self.id()
            )));
        }
        let mut writer = self.writer.lock().await;
        framing::write_frame(&mut *writer, data, self.max_frame_size)
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        let already_closed = *closed.borrow_and_update();
        if already_closed {
            return Ok(None);
        }

        let mut reader = self.reader.lock().await;
        tokio::select! {
            frame = framing::read_frame(&mut *reader, self.max_frame_size) => {
                frame.map_err(TransportError::ReceiveFailed)
            }
            () = wait_closed(&mut closed) => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(TransportError::SendFailed(e)),
        }
    }

    fn id(&self) -> ConnectionId {
        self.lease.id()
    }
}

