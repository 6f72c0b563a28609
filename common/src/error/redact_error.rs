use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised when a secret is about to leave the process in serialized form.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Redacted Value Error: refusing to serialize {what} {location}")]
    Serialization {
        what: &'static str,
        location: ErrorLocation,
    },
}
