//! Error types
//!
//! One error enum covers every failure the fan-out engine can report:
//! opening or reading the upstream, decoding a single event, and building
//! resource keys. Cancellation is not an error and never shows up here; see
//! [`Termination`](crate::registry::Termination).

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for upstream, framing and decode operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Upstream answered with a resource-absent status
    #[error("404 Not Found: {url}")]
    NotFound {
        /// Requested URL
        url: String,
    },

    /// Upstream answered with any other non-success status
    #[error("upstream returned {status} for {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// HTTP transport failed while connecting or mid-stream
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Byte source failed (non-HTTP sources)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event payload was not valid JSON for the target type
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Event payload was rejected by a custom decoder
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// An event grew beyond the framer's buffer limit without terminating
    #[error("event exceeds {limit} bytes without a boundary")]
    EventTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// A resource URL could not be parsed or built
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request arguments cannot be expressed as an upstream request
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Whether this is the upstream "no such resource" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether this error came from a single event's payload
    ///
    /// Decode errors are per-event: the connection logs them and keeps going.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::Malformed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinguishable() {
        let err = Error::NotFound {
            url: "http://upstream/station/a/b/".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_decode());
        assert_eq!(err.to_string(), "404 Not Found: http://upstream/station/a/b/");

        let err = Error::Status {
            url: "http://upstream/".into(),
            status: 500,
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_decode_classification() {
        let json_err = serde_json::from_str::<u32>("not-json").unwrap_err();
        assert!(Error::from(json_err).is_decode());
        assert!(Error::Malformed("bad".into()).is_decode());
        assert!(!Error::EventTooLarge { limit: 8 }.is_decode());
    }
}
