//! Requester peer: awaitable calls with correlation and timeout.
//!
//! A call registers a oneshot waiter keyed by the request's correlation id
//! *before* sending, then awaits it under the configured deadline. A spawned
//! reader task routes decoded responses into the pending table by id and
//! drops everything unmatched — late replies after a timeout, duplicates,
//! and foreign traffic all land in the same silent bin. Responses may arrive
//! in any order; correlation is by id alone.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;
use tokio::sync::{oneshot, RwLock};

use crate::error::BridgeError;
use crate::store::{self, StoreMap};
use crate::transport::{InboundReceiver, Transport};
use xdstore_protocol::{DenialCode, Envelope, Namespace, Operation, WireMessage};

/// Default call and handshake timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Configuration
// ============================================================================

/// Requester configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RequesterConfig {
    /// Origin of the responder context.
    pub target_origin: String,

    /// Deadline in milliseconds after which a call fails with a timeout.
    pub timeout_ms: u64,

    /// Mirror every dispatched operation into the local stores, immediately
    /// on dispatch and independent of the remote outcome.
    pub duplicate: bool,

    /// Serve failed calls (not connected, timeout, denial, remote failure)
    /// from the local stores instead of surfacing the error. This masks
    /// failures: a call that "succeeds" under fallback may have executed
    /// only locally.
    pub fallback: bool,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            target_origin: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            duplicate: false,
            fallback: false,
        }
    }
}

impl RequesterConfig {
    /// Config with default timeout and both modes off.
    pub fn new(target_origin: impl Into<String>) -> Self {
        Self {
            target_origin: target_origin.into(),
            ..Self::default()
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// Connection state
// ============================================================================

/// Requester connection state.
///
/// `Disconnected -> Connecting -> Connected` on a successful handshake;
/// back to `Disconnected` on handshake failure, handshake timeout, or
/// explicit disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ============================================================================
// Requester
// ============================================================================

/// Pending call waiters - maps correlation id to oneshot sender.
type PendingCalls = Arc<RwLock<HashMap<String, oneshot::Sender<WireMessage>>>>;

/// The peer initiating storage operations against a remote namespace.
pub struct Requester {
    config: RequesterConfig,
    /// Local stores, used by duplicate and fallback modes.
    stores: StoreMap,
    transport: Arc<dyn Transport>,
    state: Arc<RwLock<ConnectionState>>,
    /// Pending call waiters (shared with the reader task).
    pending: PendingCalls,
    /// Handle to the background reader task.
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl Requester {
    /// Create a requester and start its reader task on `inbound`.
    ///
    /// The requester starts disconnected; call [`connect`](Self::connect)
    /// before issuing operations.
    pub fn new(
        config: RequesterConfig,
        stores: StoreMap,
        transport: Arc<dyn Transport>,
        mut inbound: InboundReceiver,
    ) -> Self {
        let pending: PendingCalls = Arc::new(RwLock::new(HashMap::new()));

        let reader_pending = Arc::clone(&pending);
        let reader_handle = tokio::spawn(async move {
            while let Some(msg) = inbound.recv().await {
                let Some(message) = Envelope::decode(&msg.payload) else {
                    // Not addressed to this protocol.
                    continue;
                };

                match message {
                    WireMessage::Response { .. } | WireMessage::Welcome { .. } => {
                        let id = message.id().to_string();
                        let waiter = reader_pending.write().await.remove(&id);
                        match waiter {
                            Some(tx) => {
                                // Receiver gone means the call just timed
                                // out; nothing left to resolve.
                                let _ = tx.send(message);
                            }
                            // Already resolved, timed out, or foreign.
                            None => debug!("dropping unmatched response {id}"),
                        }
                    }
                    // Responder-side traffic; nothing for us to do.
                    WireMessage::Request { .. } | WireMessage::Hello { .. } => {}
                }
            }
            debug!("requester inbound channel closed");
        });

        Self {
            config,
            stores,
            transport,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            pending,
            _reader_handle: reader_handle,
        }
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Connect using the configured timeout.
    pub async fn connect(&self) -> Result<(), BridgeError> {
        self.connect_with_timeout(self.config.timeout()).await
    }

    /// Handshake with the responder: send a hello, await the correlated
    /// welcome under `timeout`.
    ///
    /// Idempotent: a connect while already connecting or connected is a
    /// no-op returning `Ok`.
    pub async fn connect_with_timeout(&self, timeout: Duration) -> Result<(), BridgeError> {
        {
            let mut state = self.state.write().await;
            if *state != ConnectionState::Disconnected {
                debug!("connect while {:?}; ignoring", *state);
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }

        match self.handshake(timeout).await {
            Ok(()) => {
                *self.state.write().await = ConnectionState::Connected;
                info!("connected to {}", self.config.target_origin);
                Ok(())
            }
            Err(err) => {
                *self.state.write().await = ConnectionState::Disconnected;
                warn!("handshake with {} failed: {err}", self.config.target_origin);
                Err(err)
            }
        }
    }

    async fn handshake(&self, timeout: Duration) -> Result<(), BridgeError> {
        let envelope = Envelope::hello();
        let id = envelope.message.id().to_string();

        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(id.clone(), tx);

        if let Err(err) = self
            .transport
            .send(&self.config.target_origin, envelope.encode())
            .await
        {
            self.pending.write().await.remove(&id);
            return Err(BridgeError::HandshakeFailed(err.to_string()));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(WireMessage::Welcome { .. })) => Ok(()),
            Ok(Ok(other)) => Err(BridgeError::HandshakeFailed(format!(
                "unexpected handshake reply: {other:?}"
            ))),
            Ok(Err(_)) => Err(BridgeError::HandshakeFailed(
                "connection closed".to_string(),
            )),
            Err(_) => {
                self.pending.write().await.remove(&id);
                Err(BridgeError::HandshakeTimeout { after: timeout })
            }
        }
    }

    /// Disconnect and fail every pending call with `NotConnected` now,
    /// rather than leaving it to time out.
    pub async fn disconnect(&self) {
        *self.state.write().await = ConnectionState::Disconnected;

        let drained: Vec<(String, oneshot::Sender<WireMessage>)> = {
            let mut pending = self.pending.write().await;
            pending.drain().collect()
        };
        // Dropping a waiter's sender rejects the awaiting call.
        for (id, _tx) in drained {
            debug!("cancelling pending call {id}");
        }

        info!("disconnected from {}", self.config.target_origin);
    }

    /// Whether the handshake has completed.
    pub async fn connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Connected
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Number of calls currently awaiting a response (for debugging).
    pub async fn pending_call_count(&self) -> usize {
        self.pending.read().await.len()
    }

    // ========================================================================
    // Storage operations
    // ========================================================================

    /// Read `key` from the primary remote namespace.
    pub async fn get(&self, key: &str) -> Result<Option<String>, BridgeError> {
        self.get_in(Namespace::PRIMARY, key).await
    }

    /// Read `key` from the named remote namespace.
    pub async fn get_in(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> Result<Option<String>, BridgeError> {
        self.call(namespace, Operation::Get { key: key.to_string() })
            .await
    }

    /// Store `value` under `key` in the primary remote namespace, returning
    /// the previous value.
    pub async fn set(&self, key: &str, value: &str) -> Result<Option<String>, BridgeError> {
        self.set_in(Namespace::PRIMARY, key, value).await
    }

    /// Store `value` under `key` in the named remote namespace.
    pub async fn set_in(
        &self,
        namespace: Namespace,
        key: &str,
        value: &str,
    ) -> Result<Option<String>, BridgeError> {
        self.call(
            namespace,
            Operation::Set {
                key: key.to_string(),
                value: value.to_string(),
            },
        )
        .await
    }

    /// Delete `key` from the primary remote namespace, returning the
    /// previous value.
    pub async fn remove(&self, key: &str) -> Result<Option<String>, BridgeError> {
        self.remove_in(Namespace::PRIMARY, key).await
    }

    /// Delete `key` from the named remote namespace.
    pub async fn remove_in(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> Result<Option<String>, BridgeError> {
        self.call(namespace, Operation::Remove { key: key.to_string() })
            .await
    }

    // ========================================================================
    // Call path
    // ========================================================================

    async fn call(
        &self,
        namespace: Namespace,
        op: Operation,
    ) -> Result<Option<String>, BridgeError> {
        match self.call_remote(namespace, op.clone()).await {
            Ok(result) => Ok(result),
            Err(err) if self.config.fallback => {
                // Terminal local execution, never a retry of the remote call.
                warn!("remote {op} failed ({err}); serving from local {namespace} store");
                self.apply_local(namespace, &op).await
            }
            Err(err) => Err(err),
        }
    }

    async fn call_remote(
        &self,
        namespace: Namespace,
        op: Operation,
    ) -> Result<Option<String>, BridgeError> {
        if !self.connected().await {
            return Err(BridgeError::NotConnected);
        }

        let envelope = Envelope::request(namespace, op.clone());
        let id = envelope.message.id().to_string();

        // Register the waiter before sending so a fast reply cannot race
        // past an empty pending table.
        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(id.clone(), tx);

        if let Err(err) = self
            .transport
            .send(&self.config.target_origin, envelope.encode())
            .await
        {
            self.pending.write().await.remove(&id);
            return Err(err.into());
        }

        if self.config.duplicate {
            // Side channel only; failure never affects the remote call.
            if let Err(err) = self.apply_local(namespace, &op).await {
                warn!("duplicate {op} on local {namespace} store failed: {err}");
            }
        }

        let deadline = self.config.timeout();
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(message)) => {
                debug!("resolved {op} on {namespace} ({id})");
                Self::resolve(message)
            }
            // Waiter dropped: disconnect drained the pending table.
            Ok(Err(_)) => Err(BridgeError::NotConnected),
            Err(_) => {
                // A late reply finds no waiter and is dropped by the reader.
                self.pending.write().await.remove(&id);
                Err(BridgeError::Timeout { after: deadline })
            }
        }
    }

    /// Map a correlated reply into the call's outcome.
    fn resolve(message: WireMessage) -> Result<Option<String>, BridgeError> {
        match message {
            WireMessage::Response {
                success: true,
                data,
                ..
            } => Ok(data.and_then(|v| v.as_str().map(str::to_string))),
            WireMessage::Response {
                success: false,
                error,
                code,
                ..
            } => {
                let reason = error.unwrap_or_else(|| "unknown error".to_string());
                Err(match code {
                    Some(DenialCode::OriginNotAllowed) => BridgeError::OriginRejected(reason),
                    Some(DenialCode::MethodNotAllowed) => BridgeError::MethodRejected(reason),
                    Some(DenialCode::NamespaceNotAllowed) => {
                        BridgeError::NamespaceRejected(reason)
                    }
                    Some(DenialCode::ExecutionFailed) | None => {
                        BridgeError::RemoteExecutionFailed(reason)
                    }
                })
            }
            other => Err(BridgeError::RemoteExecutionFailed(format!(
                "unexpected reply: {other:?}"
            ))),
        }
    }

    async fn apply_local(
        &self,
        namespace: Namespace,
        op: &Operation,
    ) -> Result<Option<String>, BridgeError> {
        Ok(store::apply(&self.stores, namespace, op).await?)
    }
}
