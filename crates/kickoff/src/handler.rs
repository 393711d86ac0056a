//! Per-connection handler: registration, event routing, and cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. AWAITING_IDENTITY: receive one registration frame → register session
//!   2. ACTIVE: loop receiving envelopes → matchmaking or relay
//!   3. TERMINATED: leave the lobby, unregister, close the transport
//!
//! A second task per connection drains the session's outbound queue and
//! writes to the socket, so nothing that holds a lock ever awaits I/O.

use std::sync::Arc;
use std::time::Duration;

use kickoff_protocol::{ClientEvent, Codec, Envelope, ProtocolError, User, UserId, unix_secs};
use kickoff_session::{Outbound, OutboundReceiver, SessionError, outbound_channel};
use kickoff_transport::{Connection, ConnectionId, TransportError};

use crate::KickoffError;
use crate::relay;
use crate::server::ServerState;

/// Everything cleanup needs, captured once the session exists.
struct Cleanup<K: Connection, C: Codec> {
    conn: Arc<K>,
    user_id: UserId,
    state: Arc<ServerState<C>>,
}

impl<K: Connection, C: Codec> Cleanup<K, C> {
    async fn run(self) {
        let conn_id = self.conn.id();
        let departure = {
            let mut lobby = self.state.lobby.lock().await;
            let departure = lobby.leave(self.user_id);

            let mut sessions = self.state.sessions.lock().await;
            if let Some(opponent) = departure.opponent {
                if self.state.config.close_opponent_on_disconnect {
                    sessions.send_to(opponent, Outbound::Close);
                }
            }
            sessions.unregister(conn_id);
            departure
        };

        tracing::info!(
            %conn_id,
            user_id = %self.user_id,
            opponent = ?departure.opponent,
            was_queued = departure.was_queued,
            "connection terminated"
        );

        if let Err(e) = self.conn.close().await {
            tracing::debug!(%conn_id, error = %e, "close after cleanup failed");
        }
    }
}

/// Drop guard that runs cleanup exactly once when the handler exits.
///
/// The normal path calls [`finish`](Self::finish) and awaits cleanup
/// inline. If the handler panics or its task is aborted, `Drop` still sees
/// the pending cleanup and spawns it, since `Drop` cannot await.
struct SessionGuard<K: Connection, C: Codec> {
    cleanup: Option<Cleanup<K, C>>,
}

impl<K: Connection, C: Codec> SessionGuard<K, C> {
    async fn finish(mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.run().await;
        }
    }
}

impl<K: Connection, C: Codec> Drop for SessionGuard<K, C> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(cleanup.run());
                }
                Err(_) => {
                    tracing::warn!(user_id = %cleanup.user_id, "no runtime left to run cleanup");
                }
            }
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<K, C>(
    conn: K,
    state: Arc<ServerState<C>>,
) -> Result<(), KickoffError>
where
    K: Connection,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- AWAITING_IDENTITY ---
    let user = match await_identity(&*conn, &state).await {
        Ok(user) => user,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let user_id = user.id;

    let (outbound, outbound_rx) = outbound_channel();
    let registered = state.sessions.lock().await.register(conn_id, user.clone(), outbound).map(|_| ());
    if let Err(e) = registered {
        match &e {
            SessionError::UserAlreadyConnected(..) => {
                tracing::warn!(%conn_id, %user_id, error = %e, "registration rejected");
            }
            _ => {
                tracing::error!(%conn_id, %user_id, error = %e, "session invariant violated");
            }
        }
        let _ = conn.close().await;
        return Err(e.into());
    }
    tracing::info!(%conn_id, %user, "user registered");

    let guard = SessionGuard {
        cleanup: Some(Cleanup {
            conn: Arc::clone(&conn),
            user_id,
            state: Arc::clone(&state),
        }),
    };
    tokio::spawn(write_outbound(Arc::clone(&conn), Arc::clone(&state), outbound_rx));

    // --- ACTIVE ---
    let result = run_active(&*conn, &state, &user).await;

    // --- TERMINATED ---
    guard.finish().await;
    result
}

/// Reads and validates the registration frame.
async fn await_identity<K, C>(conn: &K, state: &ServerState<C>) -> Result<User, KickoffError>
where
    K: Connection,
    C: Codec,
{
    let data = match recv_within(conn, state.config.registration_timeout).await {
        Some(Ok(Some(data))) => data,
        Some(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before registration".into(),
            )
            .into());
        }
        Some(Err(e)) => return Err(e.into()),
        None => {
            return Err(ProtocolError::InvalidMessage("registration timed out".into()).into());
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    Ok(User::from_registration(envelope)?)
}

/// The ACTIVE loop. Returns `Ok(())` when the peer goes away and `Err`
/// for faults that end the connection.
async fn run_active<K, C>(conn: &K, state: &ServerState<C>, user: &User) -> Result<(), KickoffError>
where
    K: Connection,
    C: Codec,
{
    let conn_id = conn.id();
    let user_id = user.id;

    loop {
        let data = match recv_within(conn, state.config.idle_timeout).await {
            Some(Ok(Some(data))) => data,
            Some(Ok(None)) => {
                tracing::info!(%conn_id, %user_id, "connection closed");
                return Ok(());
            }
            Some(Err(e)) => {
                tracing::debug!(%conn_id, %user_id, error = %e, "recv error");
                return Err(e.into());
            }
            None => {
                tracing::info!(%conn_id, %user_id, "connection idle, dropping");
                return Ok(());
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(%conn_id, %user_id, error = %e, "undecodable frame");
                return Err(e.into());
            }
        };

        match ClientEvent::from_envelope(envelope) {
            ClientEvent::MatchRequest => match relay::request_match(state, user).await {
                Ok(_) => {}
                Err(e) if e.is_protocol_violation() => {
                    tracing::warn!(%conn_id, %user_id, error = %e, "match request dropped");
                }
                Err(e) => {
                    tracing::error!(%conn_id, %user_id, error = %e, "matchmaking invariant violated");
                    return Err(e.into());
                }
            },
            ClientEvent::BoardUpdate(payload) => {
                if let Err(e) = relay::relay_board_update(state, user_id, payload).await {
                    tracing::warn!(%conn_id, %user_id, error = %e, "board update dropped");
                }
            }
            ClientEvent::Unknown(tag) => {
                tracing::debug!(%conn_id, %user_id, %tag, "ignoring unknown event");
            }
        }
    }
}

/// `recv` bounded by `limit`. `None` means the limit elapsed.
async fn recv_within<K: Connection>(
    conn: &K,
    limit: Option<Duration>,
) -> Option<Result<Option<Vec<u8>>, TransportError>> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, conn.recv()).await.ok(),
        None => Some(conn.recv().await),
    }
}

/// Drains a session's outbound queue onto its connection.
///
/// Ends when the queue closes (session unregistered), on
/// [`Outbound::Close`], or on the first failed write.
async fn write_outbound<K, C>(conn: Arc<K>, state: Arc<ServerState<C>>, mut rx: OutboundReceiver)
where
    K: Connection,
    C: Codec,
{
    let conn_id: ConnectionId = conn.id();

    while let Some(item) = rx.recv().await {
        let event = match item {
            Outbound::Event(event) => event,
            Outbound::Close => {
                tracing::info!(%conn_id, "closing on request");
                if let Err(e) = conn.close().await {
                    tracing::debug!(%conn_id, error = %e, "close failed");
                }
                return;
            }
        };

        let tag = event.tag();
        let bytes = match event
            .into_envelope(unix_secs())
            .and_then(|envelope| state.codec.encode(&envelope))
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(%conn_id, %tag, error = %e, "failed to encode event");
                continue;
            }
        };

        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, %tag, error = %e, "send failed, writer stopping");
            return;
        }
        tracing::trace!(%conn_id, %tag, "event sent");
    }
}

#[cfg(test)]
mod tests {
    //! Handlers driven directly, so a test can abort the task serving a
    //! connection and watch the drop guard clean up after it.

    use std::time::Duration;

    use kickoff_lobby::Lobby;
    use kickoff_protocol::{JsonCodec, MatchStart, ServerEvent};
    use kickoff_transport::framing::{self, MAX_FRAME_SIZE};
    use kickoff_transport::{TcpTransport, Transport};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::{LobbySnapshot, ServerConfig, ServerMonitor};

    const PATIENCE: Duration = Duration::from_secs(2);

    type Handler = JoinHandle<Result<(), KickoffError>>;

    struct Harness {
        transport: TcpTransport,
        addr: String,
        state: Arc<ServerState<JsonCodec>>,
        monitor: ServerMonitor,
    }

    impl Harness {
        async fn new() -> Self {
            let transport = TcpTransport::bind("127.0.0.1:0").await.expect("bind");
            let addr = transport.local_addr().expect("local addr").to_string();
            let state = Arc::new(ServerState::new(
                Lobby::default(),
                JsonCodec,
                ServerConfig::default(),
            ));
            let monitor = state.monitor();
            Self {
                transport,
                addr,
                state,
                monitor,
            }
        }

        /// Connects and registers a client, returning its stream and the
        /// task handling it on the server.
        async fn join(&mut self, id: i64, name: &str) -> (TcpStream, Handler) {
            let (accepted, connected) =
                tokio::join!(self.transport.accept(), TcpStream::connect(&self.addr));
            let conn = accepted.expect("accept");
            let mut stream = connected.expect("connect");
            let handler = tokio::spawn(handle_connection(conn, Arc::clone(&self.state)));

            send(&mut stream, &Envelope::registration(&User::new(id, name)).unwrap()).await;
            let user = UserId(id);
            let deadline = tokio::time::Instant::now() + PATIENCE;
            while !self.monitor.is_connected(user).await {
                assert!(tokio::time::Instant::now() < deadline, "{user} never registered");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            (stream, handler)
        }

        async fn wait_until(&self, what: &str, pred: impl Fn(&LobbySnapshot) -> bool) {
            let deadline = tokio::time::Instant::now() + PATIENCE;
            loop {
                let snapshot = self.monitor.snapshot().await;
                if pred(&snapshot) {
                    return;
                }
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "timed out waiting for {what}; last snapshot: {snapshot:?}"
                );
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    async fn send(stream: &mut TcpStream, envelope: &Envelope) {
        let bytes = serde_json::to_vec(envelope).expect("encode");
        framing::write_frame(stream, &bytes, MAX_FRAME_SIZE)
            .await
            .expect("send frame");
    }

    async fn request_match(stream: &mut TcpStream) {
        send(stream, &ClientEvent::MatchRequest.into_envelope()).await;
    }

    async fn expect_match_start(stream: &mut TcpStream) -> MatchStart {
        let frame = tokio::time::timeout(PATIENCE, framing::read_frame(stream, MAX_FRAME_SIZE))
            .await
            .expect("timed out waiting for match_start")
            .expect("read frame")
            .expect("closed before match_start");
        let envelope: Envelope = serde_json::from_slice(&frame).expect("decode");
        match ServerEvent::from_envelope(envelope).expect("server event") {
            ServerEvent::MatchStart(start) => start,
            other => panic!("expected match_start, got {other:?}"),
        }
    }

    async fn assert_closed(stream: &mut TcpStream) {
        let result = tokio::time::timeout(PATIENCE, framing::read_frame(stream, MAX_FRAME_SIZE))
            .await
            .expect("connection should be closed");
        assert!(
            matches!(result, Ok(None) | Err(_)),
            "expected close, got {result:?}"
        );
    }

    /// Aborts `handler` and confirms the task really was cancelled rather
    /// than finishing on its own.
    async fn abort(handler: Handler) {
        handler.abort();
        let outcome = handler.await;
        assert!(
            outcome.as_ref().is_err_and(|e| e.is_cancelled()),
            "handler was not cancelled: {outcome:?}"
        );
    }

    #[tokio::test]
    async fn test_aborted_matched_handler_cleans_up_and_closes_opponent() {
        let mut harness = Harness::new().await;
        let (mut alice, alice_handler) = harness.join(1, "alice").await;
        let (mut bob, bob_handler) = harness.join(2, "bob").await;

        request_match(&mut alice).await;
        harness
            .wait_until("alice queued", |s| s.queued == [UserId(1)])
            .await;
        request_match(&mut bob).await;
        let start = expect_match_start(&mut alice).await;
        assert_eq!(expect_match_start(&mut bob).await, start);
        assert_eq!(harness.monitor.opponent_of(UserId(2)).await, Some(UserId(1)));

        // Alice's socket stays open, so only the aborted task can trigger
        // her cleanup.
        abort(alice_handler).await;

        assert_closed(&mut bob).await;
        assert_closed(&mut alice).await;
        harness
            .wait_until("both sessions gone", |s| {
                s.sessions == 0 && s.queued.is_empty() && s.matches.is_empty()
            })
            .await;
        assert!(!harness.monitor.is_connected(UserId(1)).await);
        assert_eq!(harness.monitor.opponent_of(UserId(2)).await, None);

        // Bob's handler ended normally once his connection was closed.
        let bob_result = tokio::time::timeout(PATIENCE, bob_handler)
            .await
            .expect("bob's handler should finish")
            .expect("bob's handler should not panic");
        assert!(bob_result.is_ok(), "bob's handler failed: {bob_result:?}");
    }

    #[tokio::test]
    async fn test_aborted_queued_handler_leaves_the_queue() {
        let mut harness = Harness::new().await;
        let (mut alice, alice_handler) = harness.join(1, "alice").await;

        request_match(&mut alice).await;
        harness
            .wait_until("alice queued", |s| s.queued == [UserId(1)])
            .await;

        abort(alice_handler).await;

        assert_closed(&mut alice).await;
        harness
            .wait_until("alice gone", |s| s.sessions == 0 && s.queued.is_empty())
            .await;

        // The next requester waits instead of being paired with a ghost.
        let (mut bob, _bob_handler) = harness.join(2, "bob").await;
        request_match(&mut bob).await;
        harness
            .wait_until("bob queued", |s| s.queued == [UserId(2)] && s.matches.is_empty())
            .await;
    }

    #[tokio::test]
    async fn test_aborted_handler_frees_the_user_id() {
        let mut harness = Harness::new().await;
        let (_alice, alice_handler) = harness.join(1, "alice").await;

        abort(alice_handler).await;
        harness.wait_until("alice gone", |s| s.sessions == 0).await;

        // The same id registers again without being rejected as a duplicate.
        let (_again, _handler) = harness.join(1, "alice").await;
        assert!(harness.monitor.is_connected(UserId(1)).await);
    }
}
