//! Error types for the IMAP client.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to an IMAP server.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or record error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name cannot be used as a TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server response could not be parsed.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte offset into the response line.
        position: usize,
        /// What the parser expected.
        message: String,
    },

    /// LOGIN was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server answered NO.
    #[error("Server returned NO: {0}")]
    No(String),

    /// Server answered BAD.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE and is closing the connection.
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Command issued in the wrong protocol state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Unexpected data or a violated framing limit.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true when the failure came from the transport rather than
    /// from a server verdict.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Tls(_) | Self::Timeout(_) | Self::Bye(_))
    }
}

/// Result alias for IMAP operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert!(io.is_transport());
        assert!(Error::Bye("shutting down".into()).is_transport());
        assert!(!Error::No("nope".into()).is_transport());
        assert!(!Error::Auth("bad password".into()).is_transport());
    }
}
