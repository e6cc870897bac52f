//! Transport seam.
//!
//! The bridge never touches a host messaging API directly. A peer is handed
//! a [`Transport`] for outbound sends and an [`Inbound`] receiver for
//! delivered messages, so the protocol logic runs against anything that can
//! move an opaque string between two contexts and tag it with the sender's
//! origin.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

pub mod memory;

/// A message delivered to a peer: the sender's origin plus an opaque payload.
///
/// Inbound channels may carry traffic that has nothing to do with this
/// protocol; recognition happens at decode time, not here.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub origin: String,
    pub payload: String,
}

/// Size of a peer's inbound delivery buffer.
pub const INBOUND_BUFFER_SIZE: usize = 64;

/// Outbound half of a duplex channel between two execution contexts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `payload` to the context at `target_origin`.
    ///
    /// Delivery is targeted: an implementation must not hand the payload to
    /// a context whose origin does not match `target_origin`.
    async fn send(&self, target_origin: &str, payload: String) -> Result<(), TransportError>;
}

/// Receiver half handed to a peer at construction.
pub type InboundReceiver = mpsc::Receiver<Inbound>;
