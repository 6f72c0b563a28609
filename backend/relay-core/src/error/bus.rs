use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Failure raised by a bus subscriber.
///
/// The bus does not catch these: the first failing subscriber aborts the
/// dispatch and the error is returned to whoever called `dispatch`.
#[derive(Debug, Clone, ThisError)]
pub enum BusError {
    #[error("Subscriber Error: {message} {location}")]
    Subscriber {
        message: String,
        location: ErrorLocation,
    },
}

impl BusError {
    #[track_caller]
    pub fn subscriber(message: impl Into<String>) -> Self {
        BusError::Subscriber {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }
}
