//! Message envelope types
//!
//! Every message in both directions is a single JSON object with a `type`
//! discriminator, one object per line on the wire. Decoding happens in two
//! steps so that malformed JSON and an unrecognized `type` can be reported
//! to the client as distinct errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identity::{Filter, Identity};

/// Message types the server accepts
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Register this connection under an identity
    Register {
        /// The attribute tuple to register under
        user: Identity,
    },

    /// Fan a message out to every registered client matching the filter
    Broadcast(BroadcastRequest),

    /// Client-initiated liveness check, answered with a pong
    Ping,

    /// Answer to a server-side liveness probe
    Pong,
}

/// Payload of a `broadcast` message
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRequest {
    /// Opaque payload, any JSON value
    pub message: Value,

    /// Recipient filter, taken from the top-level optional
    /// `domain`/`platform`/`user_id`/`role` fields
    #[serde(flatten)]
    pub filter: Filter,
}

/// Message types the server sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Registration acknowledged
    Registered,

    /// Broadcast request accepted (fire-and-forget from the caller's view)
    BroadcastSent,

    /// A pushed notification, live or replayed from the pending queue
    Notification {
        /// The broadcast payload
        message: Value,
        /// Always `"server"`
        from: String,
    },

    /// Reply to a client ping
    Pong,

    /// Server-side liveness probe, expects a `pong` back
    Ping,

    /// Malformed input or unrecognized message type
    Error {
        /// Human-readable description
        message: String,
    },
}

impl OutboundMessage {
    /// Build a notification carrying `message`
    pub fn notification(message: Value) -> Self {
        OutboundMessage::Notification {
            message,
            from: "server".to_string(),
        }
    }

    /// Build an error reply
    pub fn error(message: impl Into<String>) -> Self {
        OutboundMessage::Error {
            message: message.into(),
        }
    }
}

/// Why an inbound line could not be decoded
#[derive(Debug)]
pub enum DecodeError {
    /// The line is not valid JSON
    Malformed(serde_json::Error),
    /// Valid JSON but the `type` discriminator is missing or unknown
    UnrecognizedType(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed(e) => write!(f, "invalid JSON: {}", e),
            DecodeError::UnrecognizedType(kind) if kind.is_empty() => {
                write!(f, "missing message type")
            }
            DecodeError::UnrecognizedType(kind) => {
                write!(f, "unrecognized message type: {}", kind)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode one inbound line
///
/// Malformed JSON and ill-shaped payloads report as [`DecodeError::Malformed`],
/// an unknown `type` as [`DecodeError::UnrecognizedType`]. Neither touches any
/// server state; the dispatcher turns both into an `error` reply and leaves
/// the connection open.
pub fn decode(line: &str) -> Result<InboundMessage, DecodeError> {
    let value: Value = serde_json::from_str(line).map_err(DecodeError::Malformed)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match kind.as_str() {
        "register" | "broadcast" | "ping" | "pong" => {
            serde_json::from_value(value).map_err(DecodeError::Malformed)
        }
        _ => Err(DecodeError::UnrecognizedType(kind)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_register() {
        let line = r#"{"type":"register","user":{"domain":"d1","platform":"web","user_id":"u1","first_name":"Ada","role":"admin"}}"#;

        let msg = decode(line).unwrap();
        match msg {
            InboundMessage::Register { user } => {
                assert_eq!(user.user_id, "u1");
                assert_eq!(user.role, "admin");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_register_partial_user() {
        // Missing attributes default to empty strings.
        let msg = decode(r#"{"type":"register","user":{"user_id":"u1"}}"#).unwrap();
        match msg {
            InboundMessage::Register { user } => {
                assert_eq!(user.user_id, "u1");
                assert!(user.domain.is_empty());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_broadcast_with_filter() {
        let line = r#"{"type":"broadcast","message":"hello","user_id":"u1","role":"admin"}"#;

        let msg = decode(line).unwrap();
        match msg {
            InboundMessage::Broadcast(req) => {
                assert_eq!(req.message, json!("hello"));
                assert_eq!(req.filter.user_id.as_deref(), Some("u1"));
                assert_eq!(req.filter.role.as_deref(), Some("admin"));
                assert!(req.filter.domain.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_broadcast_wildcard() {
        let msg = decode(r#"{"type":"broadcast","message":{"k":1}}"#).unwrap();
        match msg {
            InboundMessage::Broadcast(req) => assert!(req.filter.is_wildcard()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_ping() {
        assert!(matches!(
            decode(r#"{"type":"ping"}"#).unwrap(),
            InboundMessage::Ping
        ));
    }

    #[test]
    fn test_decode_malformed_json() {
        assert!(matches!(
            decode("{not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        match decode(r#"{"type":"subscribe"}"#) {
            Err(DecodeError::UnrecognizedType(kind)) => assert_eq!(kind, "subscribe"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_missing_type() {
        match decode(r#"{"message":"hello"}"#) {
            Err(DecodeError::UnrecognizedType(kind)) => assert!(kind.is_empty()),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_encode_notification() {
        let msg = OutboundMessage::notification(json!("hi"));
        let encoded = serde_json::to_string(&msg).unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["type"], "notification");
        assert_eq!(value["message"], "hi");
        assert_eq!(value["from"], "server");
    }

    #[test]
    fn test_encode_statuses() {
        let encoded = serde_json::to_string(&OutboundMessage::Registered).unwrap();
        assert_eq!(encoded, r#"{"type":"registered"}"#);

        let encoded = serde_json::to_string(&OutboundMessage::BroadcastSent).unwrap();
        assert_eq!(encoded, r#"{"type":"broadcast_sent"}"#);
    }
}
