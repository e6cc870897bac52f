//! Cross-origin key-value storage bridge.
//!
//! A [`Requester`] on one origin reads and writes namespaces that physically
//! live with a [`Responder`] on another origin. Operations travel as
//! correlation-id-tagged requests over an injected [`Transport`]; the
//! responder validates each sender against an ordered, fail-closed access
//! policy before touching a store, and every recognized request is answered
//! exactly once.
//!
//! ```no_run
//! use std::sync::Arc;
//! use xdstore::{
//!     in_memory_stores, transport::memory, AccessRule, Requester, RequesterConfig,
//!     Responder, ResponderConfig,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ((app_transport, app_inbound), (vault_transport, vault_inbound)) =
//!     memory::pair("https://app.test", "https://vault.test");
//!
//! let responder = Responder::new(
//!     ResponderConfig {
//!         rules: vec![AccessRule::new(r"^https://app\.test$")?],
//!     },
//!     in_memory_stores(),
//!     Arc::new(vault_transport),
//! );
//! responder.listen(vault_inbound).await?;
//!
//! let requester = Requester::new(
//!     RequesterConfig::new("https://vault.test"),
//!     in_memory_stores(),
//!     Arc::new(app_transport),
//!     app_inbound,
//! );
//! requester.connect().await?;
//!
//! requester.set("theme", "dark").await?;
//! assert_eq!(requester.get("theme").await?, Some("dark".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod policy;
pub mod requester;
pub mod responder;
pub mod store;
pub mod transport;

pub use error::{BridgeError, StoreError, TransportError};
pub use policy::{AccessRule, Policy, PolicyDecision};
pub use requester::{ConnectionState, Requester, RequesterConfig};
pub use responder::{Responder, ResponderConfig};
pub use store::{in_memory_stores, KeyValueStore, MemoryStore, StoreMap};
pub use transport::{Inbound, InboundReceiver, Transport};

pub use xdstore_protocol as protocol;
pub use xdstore_protocol::{Method, Namespace, Operation};
