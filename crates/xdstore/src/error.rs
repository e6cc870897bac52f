use std::time::Duration;

use thiserror::Error;
use xdstore_protocol::Namespace;

/// Errors surfaced to callers of the requester and responder.
///
/// Responder-side denials never cross the transport as errors — they travel
/// as error responses and are mapped back into the `*Rejected` variants on
/// the requester side. With fallback mode enabled the requester swallows
/// every failure here and serves the call from its local store instead.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("not connected")]
    NotConnected,

    #[error("timeout after {after:?}")]
    Timeout { after: Duration },

    #[error("origin rejected by responder: {0}")]
    OriginRejected(String),

    #[error("method rejected by responder: {0}")]
    MethodRejected(String),

    #[error("namespace rejected by responder: {0}")]
    NamespaceRejected(String),

    #[error("remote execution failed: {0}")]
    RemoteExecutionFailed(String),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("handshake timed out after {after:?}")]
    HandshakeTimeout { after: Duration },

    #[error("already listening")]
    AlreadyListening,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the transport seam.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

/// Errors from a key-value store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("no store configured for namespace '{0}'")]
    UnknownNamespace(Namespace),
}
