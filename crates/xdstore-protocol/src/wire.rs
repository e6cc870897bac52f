//! Wire envelope and message types.
//!
//! Messages are newline-free JSON objects. Every envelope carries a `source`
//! tag so a peer sharing its inbound channel with unrelated cross-context
//! traffic can recognize protocol messages cheaply; anything without the tag
//! (or that fails to parse at all) is simply not ours.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ops::{Namespace, Operation};

/// Source tag stamped on every protocol payload.
pub const PROTOCOL_SOURCE: &str = "xdstore";

// ============================================================================
// Denial codes
// ============================================================================

/// Machine-readable reason attached to an error response.
///
/// The human-readable `error` string is for logs; the code is what the
/// requester maps back into a typed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialCode {
    /// Sender origin matched no policy rule.
    OriginNotAllowed,
    /// Origin is known but the method is not in its allow-list.
    MethodNotAllowed,
    /// Origin is known but the namespace is not in its allow-list.
    NamespaceNotAllowed,
    /// Policy passed but the storage operation itself failed.
    ExecutionFailed,
}

// ============================================================================
// Wire messages
// ============================================================================

/// All protocol messages, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// A storage operation addressed to the responder.
    Request {
        /// Correlation ID for response matching.
        id: String,
        /// Namespace the operation targets.
        namespace: Namespace,
        #[serde(flatten)]
        op: Operation,
    },

    /// Answer to a request, echoing its id. Exactly one per executed or
    /// denied request; unrecognized inbound traffic gets none.
    Response {
        id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<DenialCode>,
    },

    /// Readiness probe sent by the requester while connecting.
    Hello { id: String },

    /// Responder acknowledgment to a hello.
    Welcome { id: String },
}

impl WireMessage {
    /// The correlation id carried by this message.
    pub fn id(&self) -> &str {
        match self {
            Self::Request { id, .. }
            | Self::Response { id, .. }
            | Self::Hello { id }
            | Self::Welcome { id } => id,
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The unit that actually travels: a source tag plus a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Always [`PROTOCOL_SOURCE`] for traffic this crate produces.
    pub source: String,

    #[serde(flatten)]
    pub message: WireMessage,
}

/// Generate a fresh correlation id.
///
/// Unique among all ids pending in this process; no registry needed.
fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

impl Envelope {
    fn wrap(message: WireMessage) -> Self {
        Self {
            source: PROTOCOL_SOURCE.to_string(),
            message,
        }
    }

    /// Build a request envelope with a fresh correlation id.
    pub fn request(namespace: Namespace, op: Operation) -> Self {
        Self::wrap(WireMessage::Request {
            id: fresh_id(),
            namespace,
            op,
        })
    }

    /// Build a readiness probe with a fresh correlation id.
    pub fn hello() -> Self {
        Self::wrap(WireMessage::Hello { id: fresh_id() })
    }

    /// Acknowledge a hello, echoing its id.
    pub fn welcome(id: impl Into<String>) -> Self {
        Self::wrap(WireMessage::Welcome { id: id.into() })
    }

    /// Build a success response echoing `id`.
    pub fn success(id: impl Into<String>, data: Option<Value>) -> Self {
        Self::wrap(WireMessage::Response {
            id: id.into(),
            success: true,
            data,
            error: None,
            code: None,
        })
    }

    /// Build an error response echoing `id`.
    pub fn failure(id: impl Into<String>, code: DenialCode, error: impl Into<String>) -> Self {
        Self::wrap(WireMessage::Response {
            id: id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            code: Some(code),
        })
    }

    /// Serialize for the wire.
    ///
    /// Infallible in practice: every envelope this crate can construct is
    /// plain data with no non-string map keys.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Try to read a raw payload as a protocol message.
    ///
    /// Returns `None` for anything that is not ours: unparseable text, JSON
    /// of the wrong shape, or an envelope without the protocol source tag.
    /// Never panics — inbound channels carry arbitrary traffic.
    pub fn decode(raw: &str) -> Option<WireMessage> {
        let envelope: Envelope = serde_json::from_str(raw).ok()?;
        if envelope.source != PROTOCOL_SOURCE {
            return None;
        }
        Some(envelope.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Method;
    use std::collections::HashSet;

    #[test]
    fn test_request_wire_shape() {
        let env = Envelope::request(
            Namespace::Local,
            Operation::Set {
                key: "k".to_string(),
                value: "v".to_string(),
            },
        );

        let json = env.encode();
        assert!(json.contains("\"source\":\"xdstore\""));
        assert!(json.contains("\"type\":\"request\""));
        assert!(json.contains("\"namespace\":\"local\""));
        assert!(json.contains("\"method\":\"set\""));

        match Envelope::decode(&json) {
            Some(WireMessage::Request { id, namespace, op }) => {
                assert!(!id.is_empty());
                assert_eq!(namespace, Namespace::Local);
                assert_eq!(op.method(), Method::Set);
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_burst_ids_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let env = Envelope::request(
                Namespace::Local,
                Operation::Get { key: "k".to_string() },
            );
            let id = env.message.id().to_string();
            assert!(!id.is_empty());
            assert!(seen.insert(id), "duplicate id in a tight burst");
        }
    }

    #[test]
    fn test_decode_rejects_foreign_traffic() {
        // Unparseable.
        assert!(Envelope::decode("not json at all").is_none());
        // Parseable but wrong shape.
        assert!(Envelope::decode("{\"hello\":42}").is_none());
        // Right shape, wrong source tag.
        let foreign = r#"{"source":"someone-else","type":"hello","id":"x"}"#;
        assert!(Envelope::decode(foreign).is_none());
        // Protocol source but garbage message.
        let garbage = r#"{"source":"xdstore","type":"launch_missiles"}"#;
        assert!(Envelope::decode(garbage).is_none());
    }

    #[test]
    fn test_error_response_round_trip() {
        let env = Envelope::failure("req-1", DenialCode::MethodNotAllowed, "method not allowed (set)");
        let json = env.encode();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"code\":\"METHOD_NOT_ALLOWED\""));

        match Envelope::decode(&json) {
            Some(WireMessage::Response {
                id,
                success,
                error,
                code,
                ..
            }) => {
                assert_eq!(id, "req-1");
                assert!(!success);
                assert_eq!(code, Some(DenialCode::MethodNotAllowed));
                assert_eq!(error.as_deref(), Some("method not allowed (set)"));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_success_response_omits_error_fields() {
        let env = Envelope::success("req-2", Some(serde_json::json!("old-value")));
        let json = env.encode();
        assert!(!json.contains("\"error\""));
        assert!(!json.contains("\"code\""));
        assert!(json.contains("\"data\":\"old-value\""));
    }

    #[test]
    fn test_hello_welcome_echo() {
        let hello = Envelope::hello();
        let id = hello.message.id().to_string();
        let welcome = Envelope::welcome(id.clone());

        match Envelope::decode(&welcome.encode()) {
            Some(WireMessage::Welcome { id: echoed }) => assert_eq!(echoed, id),
            other => panic!("expected welcome, got {other:?}"),
        }
    }
}
