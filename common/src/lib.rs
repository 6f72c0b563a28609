//! Shared building blocks for the relay workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): error locations, HTTP status helpers, secret wrappers
//! - **relay-core**: background context, port registry, configuration store, foreground client
//! - **relay-host**: binary hosting a shared background context
//!
//! Nothing in here knows about the relay protocol itself.

pub mod error;
pub mod http_status;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
