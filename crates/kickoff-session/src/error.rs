//! Error types for the session layer.

use kickoff_protocol::UserId;
use kickoff_transport::ConnectionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection already has a registered user. Registration happens
    /// exactly once per connection, so this means the handler's state
    /// machine was bypassed.
    #[error("{0} already has a registered session")]
    DuplicateSession(ConnectionId),

    /// No session is bound to the connection.
    #[error("{0} is not registered")]
    NotRegistered(ConnectionId),

    /// Another live connection already claimed this user id.
    #[error("user {0} is already connected on {1}")]
    UserAlreadyConnected(UserId, ConnectionId),
}
