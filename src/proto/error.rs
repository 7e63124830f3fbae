use std::io;

use thiserror::Error;

/// Result type alias for disquer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a Disque server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The address could not be resolved to a known scheme.
    #[error("address error: {message}")]
    Address {
        /// Description of the unparsable address.
        message: String,
    },

    /// A generic transport failure.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// The remote explicitly refused the connection.
    ///
    /// Kept distinct from [`Error::Io`] because refusal is never worth an
    /// automatic retry against the same endpoint.
    #[error("connection refused")]
    ConnectionRefused,

    /// The operation was attempted on a connection that is already closed,
    /// or whose peer was just detected dead (half-close).
    #[error("closed connection")]
    Closed,

    /// A read, write or connect deadline elapsed.
    ///
    /// A timed-out read leaves an unknown amount of frame state on the wire,
    /// so the connection is closed along with this error.
    #[error("operation timed out")]
    Timeout,

    /// The remote sent a malformed frame. Always fatal to the connection.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the malformed frame.
        message: String,
    },

    /// The server returned an error reply.
    ///
    /// This is valid protocol carrying an application-level failure; the
    /// connection stays usable and the call is never retried.
    #[error("server error: {message}")]
    Server {
        /// Error message from the server.
        message: String,
    },

    /// An argument could not be encoded, or a required argument was missing.
    /// Raised before any bytes are written.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe");
        let error = Error::Io { source: io_err };
        assert!(error.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_protocol() {
        let error = Error::protocol("unknown frame type: '!'");
        assert_eq!(error.to_string(), "protocol error: unknown frame type: '!'");
    }

    #[test]
    fn test_error_display_server() {
        let error = Error::Server {
            message: "NOREPL Not enough reachable nodes".to_string(),
        };
        assert!(error.to_string().starts_with("server error: NOREPL"));
    }

    #[test]
    fn test_error_display_closed() {
        assert_eq!(Error::Closed.to_string(), "closed connection");
    }

    #[test]
    fn test_error_display_invalid_argument() {
        let error = Error::invalid_argument("empty command");
        assert_eq!(error.to_string(), "invalid argument: empty command");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::other("test");
        let error: Error = io_err.into();
        assert!(matches!(error, Error::Io { .. }));
    }
}
