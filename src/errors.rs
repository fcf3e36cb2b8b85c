//! Error types for the log streamer

use std::fmt;

pub type Result<T> = std::result::Result<T, ShipperError>;

#[derive(Debug)]
pub enum ShipperError {
    /// IO operation failed
    Io(std::io::Error),

    /// HTTP request could not be sent or its response not received
    Http(reqwest::Error),

    /// JSON serialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Server refused the request (ingest: status >= 400, query: status >= 300)
    Rejected { status: u16, body: String },

    /// Line source failed
    Source(String),

    /// The other end of the event queue is gone
    QueueClosed,

    /// Generic error with message
    Other(String),
}

impl fmt::Display for ShipperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipperError::Io(err) => write!(f, "IO error: {}", err),
            ShipperError::Http(err) => write!(f, "HTTP error: {}", err),
            ShipperError::Json(err) => write!(f, "JSON error: {}", err),
            ShipperError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ShipperError::Rejected { status, body } => {
                write!(f, "Request rejected with status {}: {}", status, body)
            }
            ShipperError::Source(msg) => write!(f, "Source error: {}", msg),
            ShipperError::QueueClosed => write!(f, "Event queue closed"),
            ShipperError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for ShipperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShipperError::Io(err) => Some(err),
            ShipperError::Http(err) => Some(err),
            ShipperError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ShipperError {
    fn from(err: std::io::Error) -> Self {
        ShipperError::Io(err)
    }
}

impl From<reqwest::Error> for ShipperError {
    fn from(err: reqwest::Error) -> Self {
        ShipperError::Http(err)
    }
}

impl From<serde_json::Error> for ShipperError {
    fn from(err: serde_json::Error) -> Self {
        ShipperError::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display_carries_body() {
        let err = ShipperError::Rejected {
            status: 503,
            body: "ingest unavailable".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Request rejected with status 503: ingest unavailable"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.log");
        let err: ShipperError = io.into();

        assert!(matches!(err, ShipperError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
