//! Core protocol types for Kickoff's wire format.
//!
//! Every frame on the wire carries one [`Envelope`]:
//!
//! ```text
//! { "event": "board_update", "content": { ... }, "timestamp": 1718000000000 }
//! ```
//!
//! `event` is a string tag, `content` is structured JSON whose shape
//! depends on the tag, and `timestamp` (Unix seconds) is stamped on
//! every server-to-client envelope. The typed views [`ClientEvent`] and
//! [`ServerEvent`] sit on top of the envelope so the server never has to
//! look at raw tags.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Event tags
// ---------------------------------------------------------------------------

/// String tags carried in [`Envelope::event`].
pub mod tags {
    /// Client → Server, first frame. The server does not inspect the tag of
    /// the registration frame, only its content.
    pub const USER_REGISTRATION: &str = "user_registration";
    /// Client → Server: "find me an opponent".
    pub const MATCH_REQUEST: &str = "match_request";
    /// Server → Client: "you have been paired".
    pub const MATCH_START: &str = "match_start";
    /// Both directions: opaque game state, relayed verbatim.
    pub const BOARD_UPDATE: &str = "board_update";
}

/// Current wall-clock time in whole Unix seconds.
///
/// Clocks set before 1970 read as `0` rather than failing.
pub fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A client-asserted user identity. Any integer, negatives included.
///
/// Serialized as a plain number (`#[serde(transparent)]`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// Identifier of one match. Random, not guaranteed globally unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

/// A registered user: `{ "id": 1, "username": "alice" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            username: username.into(),
        }
    }

    /// Reads the user out of a registration envelope.
    ///
    /// Only `content` is looked at; whatever tag the client used is
    /// accepted.
    pub fn from_registration(envelope: Envelope) -> Result<Self, ProtocolError> {
        serde_json::from_value(envelope.content).map_err(ProtocolError::Decode)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.id)
    }
}

// ---------------------------------------------------------------------------
// Match record
// ---------------------------------------------------------------------------

/// Which half of the pitch a user plays on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// The record both players receive in `match_start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStart {
    pub id: MatchId,
    pub left_user: User,
    pub right_user: User,
    /// Unix seconds.
    pub created_at: u64,
}

impl MatchStart {
    /// Returns the participant facing `user`, or `None` if `user` is not in
    /// this match.
    pub fn opponent_of(&self, user: UserId) -> Option<&User> {
        if self.left_user.id == user {
            Some(&self.right_user)
        } else if self.right_user.id == user {
            Some(&self.left_user)
        } else {
            None
        }
    }

    /// Returns the side `user` plays on, if they are in this match.
    pub fn side_of(&self, user: UserId) -> Option<Side> {
        if self.left_user.id == user {
            Some(Side::Left)
        } else if self.right_user.id == user {
            Some(Side::Right)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope: the top-level wire format
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every frame on the wire is an Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event tag. Missing tags decode as the empty string.
    #[serde(default)]
    pub event: String,

    /// Tag-specific payload. Missing content decodes as `null`.
    #[serde(default)]
    pub content: Value,

    /// Send time in Unix seconds. Always set by the server, optional
    /// from clients, omitted from the JSON when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl Envelope {
    /// Builds an untimestamped envelope.
    pub fn new(event: impl Into<String>, content: Value) -> Self {
        Self {
            event: event.into(),
            content,
            timestamp: None,
        }
    }

    /// The registration frame a client sends first.
    pub fn registration(user: &User) -> Result<Self, ProtocolError> {
        let content = serde_json::to_value(user).map_err(ProtocolError::Encode)?;
        Ok(Self::new(tags::USER_REGISTRATION, content))
    }

    /// Stamps the envelope with a send time.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

// ---------------------------------------------------------------------------
// Typed views
// ---------------------------------------------------------------------------

/// A client-to-server event after the registration frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Ask to be paired. Any content is ignored.
    MatchRequest,
    /// Opaque game state destined for the opponent.
    BoardUpdate(Value),
    /// A tag this server does not know. Not an error: the protocol is
    /// forward-compatible.
    Unknown(String),
}

impl ClientEvent {
    /// Classifies an envelope by its tag. Never fails.
    pub fn from_envelope(envelope: Envelope) -> Self {
        match envelope.event.as_str() {
            tags::MATCH_REQUEST => Self::MatchRequest,
            tags::BOARD_UPDATE => Self::BoardUpdate(envelope.content),
            _ => Self::Unknown(envelope.event),
        }
    }

    /// The envelope a client would send for this event.
    pub fn into_envelope(self) -> Envelope {
        match self {
            Self::MatchRequest => {
                Envelope::new(tags::MATCH_REQUEST, Value::Object(Default::default()))
            }
            Self::BoardUpdate(payload) => Envelope::new(tags::BOARD_UPDATE, payload),
            Self::Unknown(tag) => Envelope::new(tag, Value::Null),
        }
    }
}

/// A server-to-client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Sent once to each participant when a match is formed.
    MatchStart(MatchStart),
    /// The opponent's board update, payload untouched.
    BoardUpdate(Value),
}

impl ServerEvent {
    /// The wire tag for this event.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MatchStart(_) => tags::MATCH_START,
            Self::BoardUpdate(_) => tags::BOARD_UPDATE,
        }
    }

    /// Wraps the event in a timestamped envelope.
    pub fn into_envelope(self, timestamp: u64) -> Result<Envelope, ProtocolError> {
        let tag = self.tag();
        let content = match self {
            Self::MatchStart(record) => {
                serde_json::to_value(record).map_err(ProtocolError::Encode)?
            }
            Self::BoardUpdate(payload) => payload,
        };
        Ok(Envelope::new(tag, content).with_timestamp(timestamp))
    }

    /// Parses a server envelope (client side).
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ProtocolError> {
        match envelope.event.as_str() {
            tags::MATCH_START => serde_json::from_value(envelope.content)
                .map(Self::MatchStart)
                .map_err(ProtocolError::Decode),
            tags::BOARD_UPDATE => Ok(Self::BoardUpdate(envelope.content)),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown server event {other:?}"
            ))),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes here are what existing game clients parse, so
    //! these tests pin the exact field names and nesting.

    use serde_json::json;

    use super::*;

    fn alice() -> User {
        User::new(1, "alice")
    }

    fn bob() -> User {
        User::new(2, "bob")
    }

    fn sample_match() -> MatchStart {
        MatchStart {
            id: MatchId(77),
            left_user: alice(),
            right_user: bob(),
            created_at: 1_700_000_000,
        }
    }

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&UserId(42)).unwrap(), "42");
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId(7).to_string(), "U-7");
        assert_eq!(MatchId(3).to_string(), "M-3");
    }

    #[test]
    fn test_user_json_format() {
        let json = serde_json::to_value(alice()).unwrap();
        assert_eq!(json, json!({ "id": 1, "username": "alice" }));
    }

    #[test]
    fn test_user_from_registration_ignores_tag() {
        let env = Envelope::new("user_registeration", json!({ "id": 5, "username": "eve" }));
        assert_eq!(User::from_registration(env).unwrap(), User::new(5, "eve"));

        let untagged: Envelope =
            serde_json::from_str(r#"{ "content": { "id": 6, "username": "mal" } }"#).unwrap();
        assert_eq!(User::from_registration(untagged).unwrap(), User::new(6, "mal"));
    }

    #[test]
    fn test_user_from_registration_accepts_negative_id() {
        let env = Envelope::new(tags::USER_REGISTRATION, json!({ "id": -1, "username": "neg" }));
        let user = User::from_registration(env).unwrap();
        assert_eq!(user.id, UserId(-1));
        assert_eq!(user.id.to_string(), "U--1");
        assert_eq!(serde_json::to_value(&user).unwrap(), json!({ "id": -1, "username": "neg" }));
    }

    #[test]
    fn test_user_from_registration_missing_fields_is_decode_error() {
        let env = Envelope::new(tags::USER_REGISTRATION, json!({ "username": "nobody" }));
        assert!(matches!(
            User::from_registration(env),
            Err(ProtocolError::Decode(_))
        ));
    }

    // =====================================================================
    // MatchStart
    // =====================================================================

    #[test]
    fn test_match_start_json_format() {
        let json = serde_json::to_value(sample_match()).unwrap();
        assert_eq!(
            json,
            json!({
                "id": 77,
                "left_user": { "id": 1, "username": "alice" },
                "right_user": { "id": 2, "username": "bob" },
                "created_at": 1_700_000_000u64
            })
        );
    }

    #[test]
    fn test_match_start_opponent_of() {
        let m = sample_match();
        assert_eq!(m.opponent_of(UserId(1)), Some(&bob()));
        assert_eq!(m.opponent_of(UserId(2)), Some(&alice()));
        assert_eq!(m.opponent_of(UserId(3)), None);
    }

    #[test]
    fn test_match_start_side_of() {
        let m = sample_match();
        assert_eq!(m.side_of(UserId(1)), Some(Side::Left));
        assert_eq!(m.side_of(UserId(2)), Some(Side::Right));
        assert_eq!(m.side_of(UserId(9)), None);
    }

    // =====================================================================
    // Envelope
    // =====================================================================

    #[test]
    fn test_envelope_omits_missing_timestamp() {
        let json = serde_json::to_value(Envelope::new("x", json!({}))).unwrap();
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn test_envelope_defaults_missing_fields() {
        let env: Envelope = serde_json::from_str("{}").unwrap();
        assert_eq!(env.event, "");
        assert_eq!(env.content, Value::Null);
        assert_eq!(env.timestamp, None);
    }

    #[test]
    fn test_envelope_rejects_non_object() {
        assert!(serde_json::from_str::<Envelope>("[1, 2]").is_err());
        assert!(serde_json::from_slice::<Envelope>(b"not json at all").is_err());
    }

    // =====================================================================
    // ClientEvent
    // =====================================================================

    #[test]
    fn test_client_event_classifies_known_tags() {
        let req = Envelope::new(tags::MATCH_REQUEST, json!({ "created_at": 1.5 }));
        assert_eq!(ClientEvent::from_envelope(req), ClientEvent::MatchRequest);

        let upd = Envelope::new(tags::BOARD_UPDATE, json!({ "x": 5 }));
        assert_eq!(
            ClientEvent::from_envelope(upd),
            ClientEvent::BoardUpdate(json!({ "x": 5 }))
        );
    }

    #[test]
    fn test_client_event_unknown_tag_is_not_an_error() {
        let env = Envelope::new("emote", json!({ "kind": "wave" }));
        assert_eq!(
            ClientEvent::from_envelope(env),
            ClientEvent::Unknown("emote".into())
        );
    }

    #[test]
    fn test_client_event_into_envelope_tags() {
        assert_eq!(ClientEvent::MatchRequest.into_envelope().event, tags::MATCH_REQUEST);
        let env = ClientEvent::BoardUpdate(json!([1, 2])).into_envelope();
        assert_eq!(env.event, tags::BOARD_UPDATE);
        assert_eq!(env.content, json!([1, 2]));
    }

    // =====================================================================
    // ServerEvent
    // =====================================================================

    #[test]
    fn test_server_event_match_start_envelope_shape() {
        let env = ServerEvent::MatchStart(sample_match())
            .into_envelope(123)
            .unwrap();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event"], "match_start");
        assert_eq!(json["timestamp"], 123);
        assert_eq!(json["content"]["left_user"]["username"], "alice");
    }

    #[test]
    fn test_server_event_board_update_payload_untouched() {
        let payload = json!({ "mouse": { "pos": { "x": 1, "y": 2 }, "status": 1 }, "objects": [] });
        let env = ServerEvent::BoardUpdate(payload.clone())
            .into_envelope(9)
            .unwrap();
        assert_eq!(env.event, tags::BOARD_UPDATE);
        assert_eq!(env.content, payload);
        assert_eq!(
            ServerEvent::from_envelope(env).unwrap(),
            ServerEvent::BoardUpdate(payload)
        );
    }

    #[test]
    fn test_board_update_bytes_survive_decode_and_encode() {
        // Key order and integers wider than 64 bits must come back as sent.
        let wire = br#"{"event":"board_update","content":{"b":1,"a":18446744073709551616,"f":0.10000000000000000001}}"#;
        let env: Envelope = serde_json::from_slice(wire).unwrap();
        let ClientEvent::BoardUpdate(payload) = ClientEvent::from_envelope(env) else {
            panic!("expected a board update");
        };
        let out = ServerEvent::BoardUpdate(payload).into_envelope(5).unwrap();
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"{"event":"board_update","content":{"b":1,"a":18446744073709551616,"f":0.10000000000000000001},"timestamp":5}"#
        );
    }

    #[test]
    fn test_server_event_from_unknown_tag_is_invalid() {
        let env = Envelope::new("surprise", Value::Null);
        assert!(matches!(
            ServerEvent::from_envelope(env),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_unix_secs_counts_seconds() {
        let now = unix_secs();
        // After 2020-01-01 and well short of a millisecond count.
        assert!(now > 1_577_836_800);
        assert!(now < 100_000_000_000);
    }
}
