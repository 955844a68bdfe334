//! Error types
//!
//! `ServerError` covers everything that can stop the process before or while
//! it starts listening. `ResolveError` covers per-request failures that are
//! turned into HTTP error responses and never reach the accept loop.

use hyper::StatusCode;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal startup errors. `main` prints them and exits non-zero.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listening socket could not be created or bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Configuration sources could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A configuration value was read but is not acceptable.
    #[error("invalid configuration for '{field}': {message}")]
    Invalid { field: &'static str, message: String },

    /// The served root is missing or not a directory.
    #[error("cannot serve root directory '{}': {source}", path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A configured extra header has an invalid name or value.
    #[error("invalid response header '{name}'")]
    InvalidHeader { name: String },

    #[error("invalid log level '{0}' (expected error, warn, info or debug)")]
    InvalidLogLevel(String),

    #[error("failed to open log file: {0}")]
    Logger(#[source] io::Error),

    #[error("failed to register signal handler: {0}")]
    Signal(#[source] io::Error),

    #[error("failed to start runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Per-request path resolution failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// Nothing servable exists at the requested path.
    #[error("not found")]
    NotFound,
    /// The path escapes the served root or cannot be read.
    #[error("forbidden")]
    Forbidden,
    /// The request path cannot be decoded.
    #[error("bad request")]
    BadRequest,
}

impl ResolveError {
    /// HTTP status the error is reported with
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest => StatusCode::BAD_REQUEST,
        }
    }

    /// Map a filesystem error to the status a client should see
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::Forbidden,
            _ => Self::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_status() {
        assert_eq!(ResolveError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ResolveError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ResolveError::BadRequest.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_from_io() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(ResolveError::from_io(&denied), ResolveError::Forbidden);
        assert_eq!(ResolveError::from_io(&missing), ResolveError::NotFound);
    }

    #[test]
    fn test_bind_error_message() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:6502".parse().unwrap(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("failed to bind 127.0.0.1:6502"));
    }
}
