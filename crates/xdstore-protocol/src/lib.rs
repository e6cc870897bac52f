//! Canonical protocol types for the xdstore storage bridge.
//!
//! Both peers speak the same wire protocol: a requester builds a
//! uniquely-identified [`WireMessage::Request`], the responder answers with a
//! [`WireMessage::Response`] echoing the request id, and a `Hello`/`Welcome`
//! exchange probes readiness before any operation is issued. Every payload
//! travels as an [`Envelope`] — plain JSON text, because the transport is
//! only assumed to carry opaque strings plus a sender origin.

pub mod ops;
pub mod wire;

pub use ops::{Method, Namespace, Operation};
pub use wire::{DenialCode, Envelope, WireMessage, PROTOCOL_SOURCE};
