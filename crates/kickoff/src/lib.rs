//! # Kickoff
//!
//! Matchmaking and message relay for two-player games.
//!
//! Clients connect, register a user identity, and ask for a match. The
//! server pairs them first-come first-served, tells both sides who they
//! are playing, and from then on forwards each player's `board_update`
//! to their opponent verbatim. It never looks inside game state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kickoff::prelude::*;
//!
//! # async fn start() -> Result<(), KickoffError> {
//! let server = KickoffServer::builder()
//!     .bind("0.0.0.0:3022")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod relay;
mod server;

pub use config::{DEFAULT_PORT, ServerConfig};
pub use error::KickoffError;
pub use server::{KickoffServer, KickoffServerBuilder, LobbySnapshot, ServerMonitor};

// Re-export sub-crates so users only need `kickoff` in their Cargo.toml.
pub use kickoff_lobby as lobby;
pub use kickoff_protocol as protocol;
pub use kickoff_session as session;
pub use kickoff_transport as transport;

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{
        DEFAULT_PORT, KickoffError, KickoffServer, KickoffServerBuilder, LobbySnapshot,
        ServerConfig, ServerMonitor,
    };
    pub use kickoff_lobby::{Lobby, LobbyError};
    pub use kickoff_protocol::{
        ClientEvent, Codec, Envelope, JsonCodec, MatchId, MatchStart, ServerEvent, Side, User,
        UserId, tags,
    };
    pub use kickoff_session::SessionError;
    pub use kickoff_transport::{
        Connection, ConnectionId, TcpTransport, Transport, TransportError, WebSocketTransport,
    };
}
