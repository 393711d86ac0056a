//! Unified error type for the Kickoff server.

use kickoff_lobby::LobbyError;
use kickoff_protocol::ProtocolError;
use kickoff_session::SessionError;
use kickoff_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KickoffError {
    /// A transport-level error (accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (duplicate binding, unknown connection).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A matchmaking error.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// Socket setup outside the transport (e.g. reading the local address).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}
