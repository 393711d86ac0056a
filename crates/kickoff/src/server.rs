//! `KickoffServer` builder and server loop.
//!
//! This is the entry point for running a Kickoff server. It ties together
//! all the layers: transport → protocol → session → lobby.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use kickoff_lobby::Lobby;
use kickoff_protocol::{Codec, JsonCodec, MatchId, UserId};
use kickoff_session::SessionRegistry;
use kickoff_transport::{TcpTransport, Transport, TransportError, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{KickoffError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// Lock order is `lobby` before `sessions`. Code that needs both takes the
/// lobby first and holds it until it is done with the sessions.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) lobby: Arc<Mutex<Lobby>>,
    pub(crate) sessions: Arc<Mutex<SessionRegistry>>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

impl<C: Codec> ServerState<C> {
    pub(crate) fn new(lobby: Lobby, codec: C, config: ServerConfig) -> Self {
        Self {
            lobby: Arc::new(Mutex::new(lobby)),
            sessions: Arc::new(Mutex::new(SessionRegistry::new())),
            codec,
            config,
        }
    }

    pub(crate) fn monitor(&self) -> ServerMonitor {
        ServerMonitor {
            lobby: Arc::clone(&self.lobby),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

/// Builder for configuring and starting a Kickoff server.
///
/// # Example
///
/// ```rust,no_run
/// use kickoff::prelude::*;
///
/// # async fn start() -> Result<(), KickoffError> {
/// let server = KickoffServer::builder()
///     .bind("0.0.0.0:3022")
///     .close_opponent_on_disconnect(true)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct KickoffServerBuilder {
    config: ServerConfig,
    lobby: Option<Lobby>,
}

impl KickoffServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            lobby: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Sets how long a new connection may take to register.
    pub fn registration_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.registration_timeout = timeout;
        self
    }

    /// Sets how long a registered connection may stay silent.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Whether a disconnect also closes the opponent's connection.
    pub fn close_opponent_on_disconnect(mut self, enabled: bool) -> Self {
        self.config.close_opponent_on_disconnect = enabled;
        self
    }

    /// Sets the TCP frame size limit.
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.config.max_frame_size = bytes;
        self
    }

    /// Uses a pre-built lobby, e.g. one with a seeded RNG.
    pub fn lobby(mut self, lobby: Lobby) -> Self {
        self.lobby = Some(lobby);
        self
    }

    /// Binds a length-prefixed TCP listener and builds the server.
    pub async fn build(self) -> Result<KickoffServer<TcpTransport, JsonCodec>, KickoffError> {
        let transport = TcpTransport::bind(&self.config.bind)
            .await?
            .with_max_frame_size(self.config.max_frame_size);
        Ok(self.build_with(transport))
    }

    /// Binds a WebSocket listener and builds the server.
    pub async fn build_websocket(
        self,
    ) -> Result<KickoffServer<WebSocketTransport, JsonCodec>, KickoffError> {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;
        Ok(self.build_with(transport))
    }

    /// Builds the server on an already-bound transport.
    pub fn build_with<T: Transport>(self, transport: T) -> KickoffServer<T, JsonCodec> {
        let state = Arc::new(ServerState::new(
            self.lobby.unwrap_or_default(),
            JsonCodec,
            self.config,
        ));
        KickoffServer { transport, state }
    }
}

impl Default for KickoffServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A Kickoff server bound to a transport.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct KickoffServer<T: Transport, C: Codec> {
    transport: T,
    state: Arc<ServerState<C>>,
}

impl KickoffServer<TcpTransport, JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> KickoffServerBuilder {
        KickoffServerBuilder::new()
    }
}

impl<C: Codec> KickoffServer<TcpTransport, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }
}

impl<C: Codec> KickoffServer<WebSocketTransport, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }
}

impl<T: Transport, C: Codec> KickoffServer<T, C> {
    /// Read-only view of the matchmaking state, usable while the server
    /// runs.
    pub fn monitor(&self) -> ServerMonitor {
        self.state.monitor()
    }

    /// The active configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the accept loop until the transport shuts down.
    ///
    /// Each accepted connection gets its own task running the connection
    /// handler. Accept errors are logged and the loop carries on.
    pub async fn run(self) -> Result<(), KickoffError> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops accepting once `signal`
    /// completes. Connections already accepted keep running.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), KickoffError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            close_opponent = self.state.config.close_opponent_on_disconnect,
            "Kickoff server running"
        );
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(TransportError::Shutdown) => return Ok(()),
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut signal => {
                    tracing::info!("shutdown requested, no longer accepting");
                    self.transport.shutdown().await?;
                    return Ok(());
                }
            }
        }
    }
}

/// Point-in-time view of the server's matchmaking state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LobbySnapshot {
    /// Registered connections.
    pub sessions: usize,
    /// Waiting users, oldest first.
    pub queued: Vec<UserId>,
    /// Live matches as `(lower id, higher id, match id)`.
    pub matches: Vec<(UserId, UserId, MatchId)>,
}

/// Cloneable handle for inspecting a running server.
#[derive(Clone)]
pub struct ServerMonitor {
    lobby: Arc<Mutex<Lobby>>,
    sessions: Arc<Mutex<SessionRegistry>>,
}

impl ServerMonitor {
    /// Captures queue, table and registry in one consistent view.
    pub async fn snapshot(&self) -> LobbySnapshot {
        let lobby = self.lobby.lock().await;
        let sessions = self.sessions.lock().await;
        LobbySnapshot {
            sessions: sessions.len(),
            queued: lobby.queue().waiting(),
            matches: lobby.table().pairs(),
        }
    }

    /// `user`'s current opponent, if any.
    pub async fn opponent_of(&self, user: UserId) -> Option<UserId> {
        self.lobby.lock().await.opponent_of(user).ok()
    }

    /// Returns `true` if `user` has a registered session.
    pub async fn is_connected(&self, user: UserId) -> bool {
        self.sessions.lock().await.is_connected(user)
    }
}
