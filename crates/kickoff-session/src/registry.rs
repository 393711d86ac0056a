//! The session registry: connection ↔ user bindings.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself; it uses plain
//! `HashMap`s. The server wraps it in a mutex, and every operation here
//! completes without awaiting, so the lock is only ever held briefly.

use std::collections::HashMap;

use kickoff_protocol::{User, UserId};
use kickoff_transport::ConnectionId;

use crate::{Outbound, OutboundSender, Session, SessionError};

/// Tracks every registered connection and the user bound to it.
///
/// ## Invariants
///
/// - A connection has at most one session.
/// - A user id is bound to at most one live connection; the two maps
///   always describe the same set of bindings.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Sessions keyed by the connection that registered them.
    sessions: HashMap<ConnectionId, Session>,

    /// Reverse index used to find a user's connection (and therefore
    /// their outbound channel) from a lobby-side `UserId`.
    users: HashMap<UserId, ConnectionId>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `user` to `connection`.
    ///
    /// # Errors
    /// - [`SessionError::DuplicateSession`] if the connection is already
    ///   registered.
    /// - [`SessionError::UserAlreadyConnected`] if the user id is bound to
    ///   another live connection. The existing binding is left alone.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        user: User,
        outbound: OutboundSender,
    ) -> Result<&Session, SessionError> {
        if self.sessions.contains_key(&connection) {
            return Err(SessionError::DuplicateSession(connection));
        }
        if let Some(existing) = self.users.get(&user.id) {
            return Err(SessionError::UserAlreadyConnected(user.id, *existing));
        }

        let user_id = user.id;
        self.users.insert(user_id, connection);
        self.sessions.insert(
            connection,
            Session {
                connection,
                user,
                outbound,
            },
        );

        tracing::info!(%connection, %user_id, "session registered");
        Ok(&self.sessions[&connection])
    }

    /// Returns the session bound to `connection`.
    ///
    /// # Errors
    /// Returns [`SessionError::NotRegistered`] if there is none.
    pub fn lookup(&self, connection: ConnectionId) -> Result<&Session, SessionError> {
        self.sessions
            .get(&connection)
            .ok_or(SessionError::NotRegistered(connection))
    }

    /// Returns the session of a connected user.
    pub fn session_of(&self, user: UserId) -> Option<&Session> {
        self.users
            .get(&user)
            .and_then(|connection| self.sessions.get(connection))
    }

    /// Returns the connection a user is bound to.
    pub fn connection_of(&self, user: UserId) -> Option<ConnectionId> {
        self.users.get(&user).copied()
    }

    /// Removes the session bound to `connection`, if any.
    ///
    /// Idempotent: unregistering an unknown connection is a no-op and
    /// returns `None`. Dropping the returned session drops its outbound
    /// sender, which lets the writer task drain and finish.
    pub fn unregister(&mut self, connection: ConnectionId) -> Option<Session> {
        let session = self.sessions.remove(&connection)?;
        // Only drop the reverse entry if it still points at us.
        if self.users.get(&session.user.id) == Some(&connection) {
            self.users.remove(&session.user.id);
        }
        tracing::info!(
            %connection,
            user_id = %session.user.id,
            "session unregistered"
        );
        Some(session)
    }

    /// Queues `item` for `user`. Fire-and-forget: returns `false` if the
    /// user is not connected or their writer has already gone away.
    pub fn send_to(&self, user: UserId, item: Outbound) -> bool {
        match self.session_of(user) {
            Some(session) => session.send(item),
            None => false,
        }
    }

    /// Returns `true` if `user` is currently connected.
    pub fn is_connected(&self, user: UserId) -> bool {
        self.users.contains_key(&user)
    }

    /// Returns the number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
