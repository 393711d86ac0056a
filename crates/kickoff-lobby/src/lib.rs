//! Matchmaking for Kickoff.
//!
//! Three pieces, each usable on its own, and the [`Lobby`] that ties them
//! together so they change atomically:
//!
//! - [`MatchmakingQueue`]: FIFO of users waiting for an opponent
//! - [`MatchTable`]: symmetric user → opponent map for live matches
//! - [`pairing`]: side lottery and match-record construction
//!
//! # Key invariants
//!
//! - A user is never both queued and matched.
//! - If A's opponent is B, then B's opponent is A.
//!
//! Both only hold if every mutation goes through one `&mut Lobby`, which
//! is why the server keeps a single `Mutex<Lobby>` rather than locking the
//! queue and the table separately.

mod error;
mod lobby;
pub mod pairing;
mod queue;
mod table;

pub use error::LobbyError;
pub use lobby::{Departure, Lobby, Pairing};
pub use queue::MatchmakingQueue;
pub use table::{ActiveMatch, MatchTable};
