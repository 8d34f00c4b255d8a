//! Common error types for Intervox
//!
//! One enum covers the whole engine-internal taxonomy; the HTTP edge
//! translates each kind to a status code. Background tasks never surface
//! these to the original caller - they log and leave the session recoverable.

use thiserror::Error;

/// Common result type for Intervox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds shared across the Intervox services
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid user metadata on the request
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Interview or question absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Index out of range, inverted time window, malformed input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted on a terminal state
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Store error; caller may retry
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Remote service answered with a non-2xx status
    #[error("{service} returned status {status}: {body}")]
    Remote {
        service: String,
        status: u16,
        body: String,
    },

    /// Remote service could not be reached at all
    #[error("{service} unreachable: {detail}")]
    RemoteUnreachable { service: String, detail: String },

    /// Remote service answered 2xx but the payload did not parse
    #[error("Malformed response from {service}: {detail}")]
    RemoteInvalid { service: String, detail: String },

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a `Remote` error from a captured status code and body.
    pub fn remote(service: &str, status: u16, body: impl Into<String>) -> Self {
        Error::Remote {
            service: service.to_string(),
            status,
            body: body.into(),
        }
    }

    /// Build a `RemoteInvalid` error for an unparseable remote payload.
    pub fn remote_invalid(service: &str, detail: impl Into<String>) -> Self {
        Error::RemoteInvalid {
            service: service.to_string(),
            detail: detail.into(),
        }
    }
}
