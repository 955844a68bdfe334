//! Logger module
//!
//! Provides logging utilities for the server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Error and warning logging
//! - File-based logging support
//!
//! Diagnostics and access lines go to stderr unless a log file is
//! configured, so stdout only carries the startup line.

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::LogLevel;

use crate::config::Config;
use crate::error::ServerError;
use std::net::SocketAddr;
use std::path::Path;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> Result<(), ServerError> {
    let level = config
        .logging
        .level
        .parse::<LogLevel>()
        .map_err(ServerError::InvalidLogLevel)?;
    writer::init(
        level,
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
    .map_err(ServerError::Logger)
}

fn write_diagnostic(level: LogLevel, message: &str) {
    if let Some(w) = writer::get() {
        w.write_diagnostic(level, message);
    } else if level <= LogLevel::Info {
        eprintln!("{} {message}", level.tag());
    }
}

/// Write to access log specifically
fn write_access(message: &str) {
    if let Some(w) = writer::get() {
        w.write_access(message);
    } else {
        eprintln!("{message}");
    }
}

pub fn log_info(message: &str) {
    write_diagnostic(LogLevel::Info, message);
}

pub fn log_debug(message: &str) {
    write_diagnostic(LogLevel::Debug, message);
}

pub fn log_warning(message: &str) {
    write_diagnostic(LogLevel::Warn, message);
}

pub fn log_error(message: &str) {
    write_diagnostic(LogLevel::Error, message);
}

pub fn log_server_start(addr: &SocketAddr, root: &Path, config: &Config) {
    log_info(&format!("Serving {} on http://{addr}", root.display()));
    log_info("Cross-origin isolation headers enabled (COEP require-corp, COOP same-origin)");
    log_info(&format!(
        "Directory listing: {}",
        if config.http.directory_listing { "on" } else { "off" }
    ));
    if let Some(workers) = config.server.workers {
        log_debug(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        log_info(&format!("Access log: {path}"));
    }
    if !config.http.headers.is_empty() {
        log_debug(&format!(
            "Extra response headers: {}",
            config
                .http
                .headers
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    log_debug(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    log_error(&format!("Failed to serve connection: {err:?}"));
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        log_info(&format!("[Headers] Count: {count}"));
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_shutdown_requested(signal: &str) {
    log_info(&format!("{signal} received, shutting down"));
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        log_info("Server stopped");
    } else {
        log_warning(&format!(
            "Server stopped with {remaining} connection(s) still open"
        ));
    }
}
