use crate::error::bus::BusError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Foreground failures. All of them are fatal for the client; there is no
/// reconnect and no degraded mode.
#[derive(Debug, ThisError)]
pub enum ClientError {
    /// Neither a shared nor a dedicated background can be hosted.
    #[error("Transport Unavailable Error: {message} {location}")]
    TransportUnavailable {
        message: String,
        location: ErrorLocation,
    },

    /// The background context reported an error or the channel broke.
    #[error("Channel Error: {message} {location}")]
    Channel {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Dispatch Error: {message} {location}")]
    Dispatch {
        message: String,
        location: ErrorLocation,
    },
}

impl From<BusError> for ClientError {
    #[track_caller]
    fn from(error: BusError) -> Self {
        ClientError::Dispatch {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    #[track_caller]
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Channel {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
