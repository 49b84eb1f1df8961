//! dnsrelay - a recursive-capable DNS relay.
//!
//! Answers queries from a local record table when possible, forwards the
//! rest to a configured upstream resolver, and relays the answers back to
//! the original client with the original identifier restored.

pub mod config;
pub mod dns;
pub mod error;
pub mod logging;
