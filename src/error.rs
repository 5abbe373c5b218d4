use serde_json::Value;

/// Every failure a CourseDesk API call can produce.
///
/// `Unauthenticated` is distinguished from other statuses so the
/// [`SessionGuard`](crate::SessionGuard) can tear the session down without the
/// HTTP layer knowing about navigation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No response was received (connection refused, DNS, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The request exceeded the dispatcher's fixed timeout.
    #[error("Request timed out")]
    Timeout,

    /// The backend answered 401.
    #[error("Not authenticated")]
    Unauthenticated { body: Value },

    /// The backend answered with a non-2xx status other than 401.
    #[error("Backend returned HTTP {status}")]
    Status { status: u16, body: Value },

    /// The extracted payload did not match the entity type.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Durable session storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Backend response body, when the failure carried one.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Unauthenticated { body } | Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// HTTP status of the backend response, when there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthenticated { .. } => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for failures where no response arrived.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}
