use common::ErrorLocation;

use relay_core::error::config::ConfigError;
use relay_core::error::http::HttpError;
use relay_core::error::ipc::IpcError;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the relay host.
#[derive(Debug, Error)]
pub enum HostError {
    /// Error from this app (directories, logger, runtime)
    #[error("Host Error: {message} {location}")]
    Host {
        message: String,
        location: ErrorLocation,
    },

    /// Settings could not be loaded or are invalid
    #[error("Settings Error: {message} {location}")]
    Settings {
        message: String,
        location: ErrorLocation,
    },

    /// The background context could not be created or served
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for HostError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        HostError::Settings {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IpcError> for HostError {
    #[track_caller]
    fn from(error: IpcError) -> Self {
        HostError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<HttpError> for HostError {
    #[track_caller]
    fn from(error: HttpError) -> Self {
        HostError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
