//! Error types for the camwatch-stream crate.

use std::time::Duration;

/// Errors that end a single connection session.
///
/// None of these escape the connection task: each one is logged with the
/// camera address and followed by a reconnect.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The TCP connection could not be established
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        /// The camera address that was dialled
        address: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The TCP connection attempt did not resolve in time
    #[error("Connection to {address} timed out after {timeout:?}")]
    ConnectTimeout {
        /// The camera address that was dialled
        address: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// A read or write on an established connection failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The camera closed the connection
    #[error("Connection closed by peer")]
    PeerClosed,

    /// No event message was decoded within the staleness window
    #[error("Event stream stalled: no message for {elapsed:?}")]
    Stalled {
        /// Time since the last decoded message
        elapsed: Duration,
    },

    /// The accumulation buffer grew past its cap without a complete message
    #[error("Event buffer exceeded {limit} bytes without a complete message")]
    BufferOverflow {
        /// The configured buffer cap
        limit: usize,
    },

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors from decoding a single framed event message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The message is not parseable XML
    #[error("Malformed event XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A required element was absent from the message
    #[error("Event message is missing <{0}>")]
    MissingField(&'static str),

    /// An end marker was found with no start marker before it
    #[error("Event message has no start marker")]
    MissingStartMarker,

    /// The message bytes are not valid UTF-8
    #[error("Event message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        let error = StreamError::Connect {
            address: "10.0.0.5".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(error.to_string(), "Failed to connect to 10.0.0.5: refused");

        let error = StreamError::ConnectTimeout {
            address: "10.0.0.5".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(error.to_string(), "Connection to 10.0.0.5 timed out after 5s");

        let error = StreamError::Stalled {
            elapsed: Duration::from_millis(2500),
        };
        assert_eq!(error.to_string(), "Event stream stalled: no message for 2.5s");

        let error = StreamError::BufferOverflow { limit: 1024 };
        assert_eq!(
            error.to_string(),
            "Event buffer exceeded 1024 bytes without a complete message"
        );

        assert_eq!(StreamError::PeerClosed.to_string(), "Connection closed by peer");
    }

    #[test]
    fn test_decode_error_display() {
        let error = DecodeError::MissingField("eventState");
        assert_eq!(error.to_string(), "Event message is missing <eventState>");

        let error = DecodeError::MissingStartMarker;
        assert_eq!(error.to_string(), "Event message has no start marker");
    }

    #[test]
    fn test_error_conversion_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let stream_error: StreamError = io_error.into();

        match stream_error {
            StreamError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
            _ => panic!("Expected Io variant"),
        }
    }
}
