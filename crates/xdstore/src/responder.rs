//! Responder peer: policy gatekeeper and executor for inbound requests.
//!
//! The responder owns no per-request state. Every inbound message is handled
//! independently: decode, gate against the policy, execute, answer. A
//! recognized request always gets exactly one reply — success, denial, or
//! execution failure — and unrecognized traffic gets none.

use std::sync::Arc;

use dashmap::DashSet;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::BridgeError;
use crate::policy::{AccessRule, Policy, PolicyDecision};
use crate::store::{self, StoreMap};
use crate::transport::{InboundReceiver, Transport};
use xdstore_protocol::{DenialCode, Envelope, Namespace, Operation, WireMessage};

/// Responder configuration.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Ordered access rules. An empty list denies every origin.
    pub rules: Vec<AccessRule>,
}

/// The peer that owns the namespaces and answers validated requests.
pub struct Responder {
    inner: Arc<ResponderInner>,
    /// Handle to the inbound task while listening.
    listener: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

struct ResponderInner {
    policy: Policy,
    stores: StoreMap,
    transport: Arc<dyn Transport>,
    /// Origins that have had at least one operation executed. Observational
    /// only; never consulted by the policy.
    serviced: DashSet<String>,
}

impl Responder {
    pub fn new(config: ResponderConfig, stores: StoreMap, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ResponderInner {
                policy: Policy::new(config.rules),
                stores,
                transport,
                serviced: DashSet::new(),
            }),
            listener: Mutex::new(None),
        }
    }

    /// Start handling messages from `inbound`.
    ///
    /// Fails with [`BridgeError::AlreadyListening`] if a listener task is
    /// already running; call [`stop_listening`](Self::stop_listening) first
    /// to swap channels.
    pub async fn listen(&self, mut inbound: InboundReceiver) -> Result<(), BridgeError> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Err(BridgeError::AlreadyListening);
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(msg) = inbound.recv().await {
                inner.handle(&msg.origin, &msg.payload).await;
            }
            debug!("responder inbound channel closed");
        });

        *listener = Some(handle);
        info!("listening for storage requests");
        Ok(())
    }

    /// Stop handling inbound messages. Idempotent.
    pub async fn stop_listening(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
            info!("stopped listening");
        }
    }

    /// Origins that have had at least one operation executed.
    pub fn serviced_origins(&self) -> Vec<String> {
        self.inner.serviced.iter().map(|o| o.key().clone()).collect()
    }
}

impl ResponderInner {
    /// Handle one delivered message. Never panics; inbound channels carry
    /// arbitrary cross-context traffic.
    async fn handle(&self, origin: &str, payload: &str) {
        let Some(message) = Envelope::decode(payload) else {
            // Not addressed to this protocol.
            return;
        };

        match message {
            WireMessage::Hello { id } => {
                // Readiness is not a capability: any origin may learn the
                // responder is alive. Operations stay policy-gated.
                debug!("hello from {origin}");
                self.post(origin, Envelope::welcome(id)).await;
            }
            WireMessage::Request { id, namespace, op } => {
                self.handle_request(origin, id, namespace, op).await;
            }
            // Requester-side traffic; nothing for us to do.
            WireMessage::Response { .. } | WireMessage::Welcome { .. } => {}
        }
    }

    async fn handle_request(&self, origin: &str, id: String, namespace: Namespace, op: Operation) {
        match self.policy.evaluate(origin, op.method(), namespace) {
            PolicyDecision::Denied { code, reason } => {
                warn!("denied {op} on {namespace} from {origin}: {reason}");
                self.post(origin, Envelope::failure(id, code, reason)).await;
            }
            PolicyDecision::Allowed => match store::apply(&self.stores, namespace, &op).await {
                Ok(previous) => {
                    self.serviced.insert(origin.to_string());
                    debug!("executed {op} on {namespace} for {origin}");
                    self.post(origin, Envelope::success(id, previous.map(Value::String)))
                        .await;
                }
                Err(err) => {
                    error!("{op} on {namespace} for {origin} failed: {err}");
                    self.post(
                        origin,
                        Envelope::failure(id, DenialCode::ExecutionFailed, err.to_string()),
                    )
                    .await;
                }
            },
        }
    }

    async fn post(&self, origin: &str, envelope: Envelope) {
        if let Err(err) = self.transport.send(origin, envelope.encode()).await {
            warn!("failed to reply to {origin}: {err}");
        }
    }
}
