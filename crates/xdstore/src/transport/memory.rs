//! In-process duplex transport.
//!
//! Wires two peers together over a pair of mpsc channels, emulating the
//! host messaging primitive: each delivered message carries the sender's
//! origin, and a send targeted at an origin other than the peer's is
//! silently discarded rather than misdelivered.

use async_trait::async_trait;
use log::warn;
use tokio::sync::mpsc;

use super::{Inbound, InboundReceiver, Transport, INBOUND_BUFFER_SIZE};
use crate::error::TransportError;

/// One half of an in-process transport pair.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    /// Origin of the context this half sends from.
    origin: String,
    /// Origin of the peer context on the other end.
    peer_origin: String,
    /// Delivery channel into the peer's inbound receiver.
    peer_tx: mpsc::Sender<Inbound>,
}

impl MemoryTransport {
    /// The origin this half sends from.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, target_origin: &str, payload: String) -> Result<(), TransportError> {
        // Targeted delivery: a mismatched target is dropped, not rerouted.
        if target_origin != "*" && target_origin != self.peer_origin {
            warn!(
                "dropping send from {} targeted at {} (peer is {})",
                self.origin, target_origin, self.peer_origin
            );
            return Ok(());
        }

        self.peer_tx
            .send(Inbound {
                origin: self.origin.clone(),
                payload,
            })
            .await
            .map_err(|_| TransportError::Closed)
    }
}

/// Create a connected transport pair between two origins.
///
/// Returns one `(transport, inbound)` half per origin: what `origin_a`
/// sends arrives on `origin_b`'s receiver tagged with `origin_a`, and vice
/// versa.
pub fn pair(
    origin_a: &str,
    origin_b: &str,
) -> (
    (MemoryTransport, InboundReceiver),
    (MemoryTransport, InboundReceiver),
) {
    let (a_tx, a_rx) = mpsc::channel(INBOUND_BUFFER_SIZE);
    let (b_tx, b_rx) = mpsc::channel(INBOUND_BUFFER_SIZE);

    let half_a = MemoryTransport {
        origin: origin_a.to_string(),
        peer_origin: origin_b.to_string(),
        peer_tx: b_tx,
    };
    let half_b = MemoryTransport {
        origin: origin_b.to_string(),
        peer_origin: origin_a.to_string(),
        peer_tx: a_tx,
    };

    ((half_a, a_rx), (half_b, b_rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_with_sender_origin() {
        let ((a, _a_rx), (b, mut b_rx)) = pair("https://a.test", "https://b.test");

        a.send("https://b.test", "hello".to_string()).await.unwrap();

        let msg = b_rx.recv().await.unwrap();
        assert_eq!(msg.origin, "https://a.test");
        assert_eq!(msg.payload, "hello");
        assert_eq!(b.origin(), "https://b.test");
    }

    #[tokio::test]
    async fn test_mismatched_target_is_dropped() {
        let ((a, _a_rx), (_b, mut b_rx)) = pair("https://a.test", "https://b.test");

        a.send("https://elsewhere.test", "hello".to_string())
            .await
            .unwrap();
        a.send("https://b.test", "for you".to_string()).await.unwrap();

        // Only the correctly targeted message arrives.
        let msg = b_rx.recv().await.unwrap();
        assert_eq!(msg.payload, "for you");
    }

    #[tokio::test]
    async fn test_send_to_closed_peer_fails() {
        let ((a, _a_rx), (_b, b_rx)) = pair("https://a.test", "https://b.test");
        drop(b_rx);

        let err = a.send("https://b.test", "hello".to_string()).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
