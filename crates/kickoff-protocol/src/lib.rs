//! Wire protocol for Kickoff.
//!
//! This crate defines the "language" that game clients and the server
//! speak:
//!
//! - **Types** ([`Envelope`], [`ClientEvent`], [`ServerEvent`],
//!   [`MatchStart`], etc.): what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes ↔ envelopes.
//! - **Errors** ([`ProtocolError`]): encode and decode failures.
//!
//! The protocol layer sits between transport (frames) and session (who is
//! connected). It knows nothing about connections or matches.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session / Lobby
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientEvent, Envelope, MatchId, MatchStart, ServerEvent, Side, User, UserId,
    tags, unix_secs,
};
