// Application state module
// Validated, shared view of the configuration handed to every connection

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use super::types::Config;
use crate::error::ServerError;
use crate::http;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Canonical served root; every resolved path must stay below it
    pub root: PathBuf,
    /// Configured `http.headers`, parsed once at startup
    pub extra_headers: HeaderMap,
    /// `Server` header value, `None` when `http.server_name` is empty
    pub server_header: Option<HeaderValue>,
    /// Same headers as raw lines, stamped on responses hyper writes itself
    pub fallback_header_lines: Bytes,

    // Cached config values for fast access without locks
    pub cached_access_log: AtomicBool,
}

impl AppState {
    /// Validate the served root and prebuild header values
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let root = config
            .server
            .root
            .canonicalize()
            .map_err(|source| ServerError::InvalidRoot {
                path: config.server.root.clone(),
                source,
            })?;
        if !root.is_dir() {
            return Err(ServerError::InvalidRoot {
                path: config.server.root.clone(),
                source: io::Error::other("not a directory"),
            });
        }

        let mut extra_headers = HeaderMap::new();
        for (name, value) in &config.http.headers {
            let invalid = || ServerError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            extra_headers.insert(header_name, header_value);
        }

        let server_header = if config.http.server_name.is_empty() {
            None
        } else {
            Some(
                HeaderValue::from_str(&config.http.server_name).map_err(|_| {
                    ServerError::InvalidHeader {
                        name: "server".to_string(),
                    }
                })?,
            )
        };

        let fallback_header_lines =
            Bytes::from(http::header_lines(server_header.as_ref(), &extra_headers));
        let cached_access_log = AtomicBool::new(config.logging.access_log);

        Ok(Self {
            config,
            root,
            extra_headers,
            server_header,
            fallback_header_lines,
            cached_access_log,
        })
    }
}
