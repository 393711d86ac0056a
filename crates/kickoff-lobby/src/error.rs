//! Error types for the lobby layer.

use kickoff_protocol::UserId;

/// Errors that can occur during matchmaking.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The user asked for a match while already playing one. The client
    /// is misbehaving; the request is dropped.
    #[error("user {0} asked for a match while already in one")]
    MatchInProgress(UserId),

    /// `establish` was handed a user that already has an opponent.
    /// Unreachable while queue and table are mutated together.
    #[error("user {0} already has an active match")]
    AlreadyMatched(UserId),

    /// `establish` was asked to pair a user with themselves.
    #[error("user {0} cannot be matched against themselves")]
    SelfPairing(UserId),

    /// The user has no opponent.
    #[error("user {0} has no active match")]
    NoActiveMatch(UserId),
}

impl LobbyError {
    /// `true` for errors a client can cause by sending events at the
    /// wrong time. Everything else points at a broken invariant.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::MatchInProgress(_) | Self::NoActiveMatch(_))
    }
}
