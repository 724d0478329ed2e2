//! Credential handling for connection tests.
//!
//! # Module Structure
//! - `credentials`: credential container with automatic memory zeroing
//! - `connection`: connection-string construction and redaction

mod connection;
mod credentials;

pub use connection::{ConnectionDescriptor, quote_value};
pub use credentials::Credentials;
