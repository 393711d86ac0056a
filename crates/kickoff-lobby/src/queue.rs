//! The matchmaking queue: users waiting for an opponent, oldest first.

use std::collections::VecDeque;

use kickoff_protocol::{User, UserId};

/// FIFO of waiting users. A user appears at most once.
///
/// The full [`User`] record is kept (not just the id) so a pairing can
/// build the match record without a second lookup elsewhere.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    waiting: VecDeque<User>,
}

impl MatchmakingQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `user` to the back of the queue.
    ///
    /// Returns `false` (and leaves the queue alone) if the user is already
    /// waiting, so a repeated request never jumps or loses its place.
    pub fn enqueue(&mut self, user: User) -> bool {
        if self.contains(user.id) {
            return false;
        }
        tracing::debug!(user_id = %user.id, depth = self.waiting.len() + 1, "user queued");
        self.waiting.push_back(user);
        true
    }

    /// The check-and-act step of matchmaking.
    ///
    /// - `requester` already waiting → `None`, queue unchanged.
    /// - someone else waiting → that head user is removed and returned.
    /// - queue empty → `requester` is enqueued, `None`.
    ///
    /// The caller must hold exclusive access (`&mut self`) for the whole
    /// call; that is what stops two requesters from both seeing an empty
    /// queue or both taking the same head.
    pub fn try_pair(&mut self, requester: &User) -> Option<User> {
        if self.contains(requester.id) {
            return None;
        }
        match self.waiting.pop_front() {
            Some(head) => Some(head),
            None => {
                self.enqueue(requester.clone());
                None
            }
        }
    }

    /// Returns `user` to the head of the queue after a pairing that could
    /// not be completed.
    pub(crate) fn push_front(&mut self, user: User) {
        if !self.contains(user.id) {
            self.waiting.push_front(user);
        }
    }

    /// Removes `user` wherever they are in the queue. No-op if absent.
    pub fn remove(&mut self, user: UserId) -> bool {
        match self.position(user) {
            Some(index) => {
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `user` is waiting.
    pub fn contains(&self, user: UserId) -> bool {
        self.waiting.iter().any(|u| u.id == user)
    }

    /// Zero-based place in line.
    pub fn position(&self, user: UserId) -> Option<usize> {
        self.waiting.iter().position(|u| u.id == user)
    }

    /// Waiting user ids, oldest first.
    pub fn waiting(&self) -> Vec<UserId> {
        self.waiting.iter().map(|u| u.id).collect()
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}
