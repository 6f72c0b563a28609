use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum PortError {
    #[error("Port Closed Error: {message} {location}")]
    Closed {
        message: String,
        location: ErrorLocation,
    },
}
