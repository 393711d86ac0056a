//! The lobby: queue, table, and RNG behind a single `&mut` borrow.

use kickoff_protocol::{MatchStart, User, UserId, unix_secs};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{LobbyError, MatchTable, MatchmakingQueue, pairing};

/// Outcome of [`Lobby::request_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    /// Nobody was waiting (or the requester already was); the requester is
    /// now in the queue.
    Waiting,
    /// The requester was paired with the longest-waiting user.
    Matched(MatchStart),
}

/// What [`Lobby::leave`] cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Departure {
    /// The opponent left behind, if the user was in a match.
    pub opponent: Option<UserId>,
    /// Whether the user was waiting in the queue.
    pub was_queued: bool,
}

/// Matchmaking state shared by every connection.
///
/// Wrap it in one mutex. Each method here is a complete transaction over
/// the queue and the table.
#[derive(Debug)]
pub struct Lobby {
    queue: MatchmakingQueue,
    table: MatchTable,
    rng: StdRng,
}

impl Default for Lobby {
    fn default() -> Self {
        Self::new()
    }
}

impl Lobby {
    /// Creates an empty lobby seeded from the OS.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Creates an empty lobby using `rng` for side lotteries and match ids.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            queue: MatchmakingQueue::new(),
            table: MatchTable::new(),
            rng,
        }
    }

    /// Handles a `match_request` from `requester`.
    ///
    /// # Errors
    /// - [`LobbyError::MatchInProgress`] if the requester is already
    ///   matched. Nothing changes.
    /// - [`LobbyError::AlreadyMatched`] / [`LobbyError::SelfPairing`] only
    ///   if the queue/table invariant is already broken.
    pub fn request_match(&mut self, requester: User) -> Result<Pairing, LobbyError> {
        if self.table.is_matched(requester.id) {
            return Err(LobbyError::MatchInProgress(requester.id));
        }

        let Some(waiting) = self.queue.try_pair(&requester) else {
            return Ok(Pairing::Waiting);
        };

        let table = &self.table;
        let match_id = pairing::draw_match_id(&mut self.rng, |id| table.contains_match(id));
        if let Err(e) = self.table.establish(requester.id, waiting.id, match_id) {
            // Waiter goes back to the head of the line.
            self.queue.push_front(waiting);
            return Err(e);
        }

        let side = pairing::flip_side(&mut self.rng);
        let start = pairing::build_match(match_id, requester, waiting, side, unix_secs());
        tracing::debug!(
            match_id = %start.id,
            left = %start.left_user.id,
            right = %start.right_user.id,
            "sides assigned"
        );
        Ok(Pairing::Matched(start))
    }

    /// Removes every trace of `user` from matchmaking: dissolves their
    /// match and drops their queue entry. Idempotent.
    pub fn leave(&mut self, user: UserId) -> Departure {
        let opponent = self.table.dissolve(user);
        let was_queued = self.queue.remove(user);
        Departure {
            opponent,
            was_queued,
        }
    }

    /// Returns `user`'s opponent.
    ///
    /// # Errors
    /// Returns [`LobbyError::NoActiveMatch`] if `user` is not matched.
    pub fn opponent_of(&self, user: UserId) -> Result<UserId, LobbyError> {
        self.table.opponent_of(user)
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    pub fn table(&self) -> &MatchTable {
        &self.table
    }
}
