//! Side lottery and match-record construction.
//!
//! Everything here is a pure function of its inputs plus an RNG, so tests
//! can pin the outcome with a seeded [`StdRng`](rand::rngs::StdRng).

use kickoff_protocol::{MatchId, MatchStart, Side, User};
use rand::Rng;

/// Match ids are drawn uniformly from `0..MATCH_ID_SPACE`.
pub const MATCH_ID_SPACE: u64 = 1_000_000_000;

/// Unbiased coin flip.
pub fn flip_side<R: Rng + ?Sized>(rng: &mut R) -> Side {
    if rng.random_bool(0.5) {
        Side::Left
    } else {
        Side::Right
    }
}

/// Draws a match id for which `in_use` returns `false`.
pub fn draw_match_id<R, F>(rng: &mut R, in_use: F) -> MatchId
where
    R: Rng + ?Sized,
    F: Fn(MatchId) -> bool,
{
    loop {
        let id = MatchId(rng.random_range(0..MATCH_ID_SPACE));
        if !in_use(id) {
            return id;
        }
    }
}

/// Builds the record sent to both players.
///
/// `requester` plays on `requester_side`; `waiting` takes the other half.
pub fn build_match(
    id: MatchId,
    requester: User,
    waiting: User,
    requester_side: Side,
    created_at: u64,
) -> MatchStart {
    let (left_user, right_user) = match requester_side {
        Side::Left => (requester, waiting),
        Side::Right => (waiting, requester),
    };
    MatchStart {
        id,
        left_user,
        right_user,
        created_at,
    }
}
