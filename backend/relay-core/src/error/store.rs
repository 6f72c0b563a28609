use crate::error::bus::BusError;

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum StoreError {
    /// The configuration fetch failed: transport error, timeout, non-200
    /// status or a non-JSON body all end up here.
    #[error("Service Unavailable Error: HTTP {status}: {message} {location}")]
    ServiceUnavailable {
        status: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Missing API Server Error: {message} {location}")]
    MissingApiServer {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Authenticated Error: {message} {location}")]
    NotAuthenticated {
        message: String,
        location: ErrorLocation,
    },

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Dispatch Error: {message} {location}")]
    Dispatch {
        message: String,
        location: ErrorLocation,
    },

    #[error("Join Error: {message} {location}")]
    Join {
        message: String,
        location: ErrorLocation,
    },
}

impl StoreError {
    /// Status carried by a [`StoreError::ServiceUnavailable`].
    pub fn status(&self) -> Option<HttpStatusCode> {
        match self {
            StoreError::ServiceUnavailable { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<url::ParseError> for StoreError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        StoreError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<BusError> for StoreError {
    #[track_caller]
    fn from(error: BusError) -> Self {
        StoreError::Dispatch {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    #[track_caller]
    fn from(error: tokio::task::JoinError) -> Self {
        StoreError::Join {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
