//! Proxy module - outbound forwarding

pub mod forwarder;

pub use forwarder::{ForwardRequest, Forwarder};
