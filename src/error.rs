use n0_error::{AnyError, stack_error};
use std::io;

use crate::parse::Authority;

/// Errors that end a single client/origin exchange.
///
/// None of these are fatal to the process: the accept loop logs the failure
/// and the connection pair is dropped.
#[stack_error(derive, add_meta)]
#[non_exhaustive]
pub enum RelayError {
    /// The bytes read from the client do not frame as an HTTP request.
    #[error("malformed request from client")]
    Framing {
        #[error(source)]
        source: AnyError,
    },

    /// Failed to open the TCP connection to the origin server.
    #[error("failed to connect to origin {authority}")]
    Connect {
        /// The normalized host:port we tried to dial.
        authority: Authority,
        #[error(source, std_err)]
        source: io::Error,
    },

    /// IO failure on the client-facing socket.
    #[error("io error on client connection")]
    Client {
        #[error(source, std_err)]
        source: io::Error,
    },

    /// IO failure while forwarding the request to the origin.
    #[error("io error on origin connection")]
    Origin {
        #[error(source, std_err)]
        source: io::Error,
    },
}

/// Errors contained inside one prefetch attempt.
///
/// These never reach the client-facing exchange; the prefetch task logs them
/// at debug level and ends.
#[stack_error(derive, add_meta)]
#[non_exhaustive]
pub enum PrefetchError {
    /// The captured relay bytes do not re-parse as an HTTP response.
    #[error("captured bytes do not parse as an HTTP response")]
    Response {
        #[error(source)]
        source: AnyError,
    },

    /// The response body declared gzip but did not decompress.
    #[error("failed to decompress response body")]
    Decode {
        #[error(source, std_err)]
        source: io::Error,
    },
}
