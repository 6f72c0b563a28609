//! HTTP status code helpers for classifying configuration fetch outcomes.

use serde::{Deserialize, Serialize};

/// HTTP status code as reported by the transport.
///
/// `0` stands for "no response": the request never completed (connection
/// refused, timeout, aborted), the same value a browser reports for an
/// aborted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    pub const NO_RESPONSE: HttpStatusCode = HttpStatusCode(0);
    pub const OK: HttpStatusCode = HttpStatusCode(200);

    /// Exactly 200. Other 2xx codes are not accepted for configuration.
    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    /// 4xx client errors.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 5xx server errors.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// The request produced no HTTP response at all.
    pub fn is_no_response(&self) -> bool {
        self.0 == 0
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        HttpStatusCode(code)
    }
}

impl std::fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
