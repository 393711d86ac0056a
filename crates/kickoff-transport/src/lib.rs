//! Transport abstraction layer for Kickoff.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the byte-stream carrying framed messages (length-prefixed TCP, WebSocket).
//!
//! # Feature Flags
//!
//! - `tcp` (default): length-prefixed frames over plain TCP
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
pub mod framing;
mod slots;
#[cfg(feature = "tcp")]
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use slots::{ConnectionSlots, SlotLease};
#[cfg(feature = "tcp")]
pub use tcp::{TcpConnection, TcpTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque, generation-stamped identifier for a connection.
///
/// The `slot` is recycled once a connection goes away, but the
/// `generation` is bumped every time that happens, so an id held past
/// its connection's lifetime never compares equal to the id of a newer
/// connection occupying the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
    slot: u32,
    generation: u32,
}

impl ConnectionId {
    /// Creates a `ConnectionId` from a slot index and its generation.
    pub fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Returns the arena slot this id points at.
    pub fn slot(self) -> u32 {
        self.slot
    }

    /// Returns the generation stamp of the slot when this id was issued.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}.{}", self.slot, self.generation)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Gracefully shuts down the transport, stopping new connections.
    fn shutdown(
        &self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// A single connection that sends and receives whole frames.
///
/// Every method takes `&self` so one task can sit in [`recv`](Self::recv)
/// while another task sends or closes the same connection.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed, either by
    /// the peer or by a local call to [`close`](Self::close).
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection. Idempotent.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

/// Resolves once a connection's close flag flips to `true`.
#[cfg(any(feature = "tcp", feature = "websocket"))]
pub(crate) async fn wait_closed(closed: &mut tokio::sync::watch::Receiver<bool>) {
    loop {
        let is_closed = *closed.borrow_and_update();
        if is_closed {
            return;
        }
        if closed.changed().await.is_err() {
            return;
        }
    }
}
