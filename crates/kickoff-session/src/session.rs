//! Session types: the record of one registered connection.

use kickoff_protocol::{ServerEvent, User};
use kickoff_transport::ConnectionId;
use tokio::sync::mpsc;

/// Something the server wants written to a user's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Encode and send this event.
    Event(ServerEvent),
    /// Close the connection. Nothing queued after this is sent.
    Close,
}

/// Sending side of a session's outbound queue.
///
/// Unbounded so that pushing to it never blocks while a lobby or registry
/// lock is held.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// Receiving side, drained by the connection's writer task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Creates the outbound queue for a new session.
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::unbounded_channel()
}

/// A single registered connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// The connection this session is bound to.
    pub connection: ConnectionId,

    /// Who the client said they are at registration. Immutable for the
    /// life of the connection.
    pub user: User,

    /// Where to push events for this user.
    pub outbound: OutboundSender,
}

impl Session {
    /// Queues an outbound item. Returns `false` if the writer is gone.
    pub fn send(&self, item: Outbound) -> bool {
        self.outbound.send(item).is_ok()
    }
}
