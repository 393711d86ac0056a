//! Session registry for Kickoff.
//!
//! A *session* is the live binding between one transport connection and
//! the user identity that connection registered with. The
//! [`SessionRegistry`] is the single source of truth for "who is connected
//! as whom", and it owns each session's outbound channel so other parts of
//! the server can push events to a user without touching their socket.
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby (beside)  ← knows who is queued / matched, by UserId
//!     ↕
//! Session Layer (this crate)  ← ConnectionId ↔ User, outbound channels
//!     ↕
//! Transport / Protocol (below)  ← ConnectionId, User, ServerEvent
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Outbound, OutboundReceiver, OutboundSender, Session, outbound_channel};
