//! Matchmaking dispatch and the opponent relay.
//!
//! Both functions take the lobby lock first and, while still holding it,
//! the sessions lock to queue outbound events. Queuing never blocks, so
//! the locks are held only for in-memory work.

use kickoff_lobby::{LobbyError, Pairing};
use kickoff_protocol::{Codec, ServerEvent, User, UserId};
use kickoff_session::Outbound;
use serde_json::Value;

use crate::server::ServerState;

/// Runs a `match_request` for `user` and, if it forms a match, queues the
/// identical `match_start` record to both participants.
pub(crate) async fn request_match<C: Codec>(
    state: &ServerState<C>,
    user: &User,
) -> Result<Pairing, LobbyError> {
    let mut lobby = state.lobby.lock().await;
    let pairing = lobby.request_match(user.clone())?;

    match &pairing {
        Pairing::Waiting => {
            tracing::info!(
                user_id = %user.id,
                position = ?lobby.queue().position(user.id),
                "waiting for an opponent"
            );
        }
        Pairing::Matched(start) => {
            let sessions = state.sessions.lock().await;
            for participant in [start.left_user.id, start.right_user.id] {
                let event = ServerEvent::MatchStart(start.clone());
                if !sessions.send_to(participant, Outbound::Event(event)) {
                    tracing::warn!(
                        match_id = %start.id,
                        user_id = %participant,
                        "match_start not delivered, participant writer gone"
                    );
                }
            }
            tracing::info!(
                match_id = %start.id,
                left = %start.left_user,
                right = %start.right_user,
                "match started"
            );
        }
    }

    Ok(pairing)
}

/// Forwards a `board_update` payload, unchanged, to `sender`'s opponent.
///
/// Fire-and-forget: a closed opponent writer is logged, not retried.
///
/// # Errors
/// Returns [`LobbyError::NoActiveMatch`] if `sender` is not matched; the
/// payload is dropped.
pub(crate) async fn relay_board_update<C: Codec>(
    state: &ServerState<C>,
    sender: UserId,
    payload: Value,
) -> Result<UserId, LobbyError> {
    let lobby = state.lobby.lock().await;
    let opponent = lobby.opponent_of(sender)?;

    let sessions = state.sessions.lock().await;
    if !sessions.send_to(opponent, Outbound::Event(ServerEvent::BoardUpdate(payload))) {
        tracing::debug!(%sender, %opponent, "opponent writer gone, update dropped");
    } else {
        tracing::trace!(%sender, %opponent, "board update relayed");
    }
    Ok(opponent)
}
