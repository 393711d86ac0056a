//! The match table: who is currently playing whom.

use std::collections::HashMap;

use kickoff_protocol::{MatchId, UserId};

use crate::LobbyError;

/// One direction of a live pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveMatch {
    pub opponent: UserId,
    pub match_id: MatchId,
}

/// Symmetric map of users to their current opponent.
///
/// Every pairing is stored twice (A → B and B → A) and both entries are
/// always inserted and removed together.
#[derive(Debug, Default)]
pub struct MatchTable {
    entries: HashMap<UserId, ActiveMatch>,
}

impl MatchTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the symmetric pair `a ↔ b` under `match_id`.
    ///
    /// # Errors
    /// - [`LobbyError::SelfPairing`] if `a == b`.
    /// - [`LobbyError::AlreadyMatched`] if either user already has an
    ///   opponent. Nothing is inserted in that case.
    pub fn establish(&mut self, a: UserId, b: UserId, match_id: MatchId) -> Result<(), LobbyError> {
        if a == b {
            return Err(LobbyError::SelfPairing(a));
        }
        for user in [a, b] {
            if self.entries.contains_key(&user) {
                return Err(LobbyError::AlreadyMatched(user));
            }
        }

        self.entries.insert(a, ActiveMatch { opponent: b, match_id });
        self.entries.insert(b, ActiveMatch { opponent: a, match_id });
        tracing::info!(%match_id, user_a = %a, user_b = %b, "match established");
        Ok(())
    }

    /// Returns `user`'s opponent.
    ///
    /// # Errors
    /// Returns [`LobbyError::NoActiveMatch`] if `user` is not matched.
    pub fn opponent_of(&self, user: UserId) -> Result<UserId, LobbyError> {
        self.entries
            .get(&user)
            .map(|m| m.opponent)
            .ok_or(LobbyError::NoActiveMatch(user))
    }

    /// Returns `user`'s side of their live match, if any.
    pub fn match_of(&self, user: UserId) -> Option<ActiveMatch> {
        self.entries.get(&user).copied()
    }

    /// Removes both directions of `user`'s pairing and returns the former
    /// opponent. Idempotent: `None` if `user` was not matched.
    pub fn dissolve(&mut self, user: UserId) -> Option<UserId> {
        let ActiveMatch { opponent, match_id } = self.entries.remove(&user)?;
        let reverse = self.entries.remove(&opponent);
        debug_assert_eq!(
            reverse.map(|m| m.opponent),
            Some(user),
            "match table lost symmetry"
        );
        tracing::info!(%match_id, %user, %opponent, "match dissolved");
        Some(opponent)
    }

    pub fn is_matched(&self, user: UserId) -> bool {
        self.entries.contains_key(&user)
    }

    /// Returns `true` if some live match uses `match_id`.
    pub fn contains_match(&self, match_id: MatchId) -> bool {
        self.entries.values().any(|m| m.match_id == match_id)
    }

    /// Number of live matches (not entries).
    pub fn len(&self) -> usize {
        self.entries.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every live match once, as `(lower id, higher id, match id)`.
    pub fn pairs(&self) -> Vec<(UserId, UserId, MatchId)> {
        let mut pairs: Vec<_> = self
            .entries
            .iter()
            .filter(|(user, m)| **user < m.opponent)
            .map(|(user, m)| (*user, m.opponent, m.match_id))
            .collect();
        pairs.sort();
        pairs
    }
}
