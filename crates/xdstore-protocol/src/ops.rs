//! Storage operations and the closed method/namespace sets.
//!
//! The protocol supports exactly three methods against exactly two
//! namespaces. Operations are a tagged variant rather than a method string
//! plus loose fields, so the executor is a pattern match and a `Set` without
//! a value is unrepresentable.

use serde::{Deserialize, Serialize};

/// Storage method. Policy rules allow-list subsets of this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Set,
    Remove,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Set => write!(f, "set"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// A named key-value namespace owned by the responder.
///
/// Mirrors the two web storage scopes of the host environment. `Local` is
/// the primary namespace and the default when a call does not name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Local,
    Session,
}

impl Namespace {
    /// The default namespace for calls that do not name one.
    pub const PRIMARY: Namespace = Namespace::Local;
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// A storage operation, tagged by `method` on the wire.
///
/// The value rides inside the `Set` variant; `Get` and `Remove` carry only
/// the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Operation {
    /// Read the value stored under `key`.
    Get { key: String },
    /// Store `value` under `key`, returning the previous value.
    Set { key: String, value: String },
    /// Delete `key`, returning the previous value.
    Remove { key: String },
}

impl Operation {
    /// The method this operation performs, for policy checks.
    pub fn method(&self) -> Method {
        match self {
            Self::Get { .. } => Method::Get,
            Self::Set { .. } => Method::Set,
            Self::Remove { .. } => Method::Remove,
        }
    }

    /// The key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            Self::Get { key } | Self::Set { key, .. } | Self::Remove { key } => key,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get { key } => write!(f, "get({key})"),
            Self::Set { key, value } => write!(f, "set({key}, {value})"),
            Self::Remove { key } => write!(f, "remove({key})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_wire_shape() {
        let op = Operation::Set {
            key: "theme".to_string(),
            value: "dark".to_string(),
        };

        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"method\":\"set\""));
        assert!(json.contains("\"key\":\"theme\""));
        assert!(json.contains("\"value\":\"dark\""));

        let parsed: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.method(), Method::Set);
        assert_eq!(parsed.key(), "theme");
    }

    #[test]
    fn test_set_requires_value() {
        // A set without a value must not deserialize.
        let raw = r#"{"method":"set","key":"theme"}"#;
        assert!(serde_json::from_str::<Operation>(raw).is_err());

        // get and remove never carry one.
        let raw = r#"{"method":"get","key":"theme"}"#;
        let parsed: Operation = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, Operation::Get { key: "theme".to_string() });
    }

    #[test]
    fn test_namespace_default_is_local() {
        assert_eq!(Namespace::PRIMARY, Namespace::Local);
        assert_eq!(serde_json::to_string(&Namespace::Session).unwrap(), "\"session\"");
    }
}
