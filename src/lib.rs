//! isoserve: a static file server that sends the cross-origin isolation
//! headers (`Cross-Origin-Embedder-Policy: require-corp` and
//! `Cross-Origin-Opener-Policy: same-origin`) on every response, so pages
//! using `SharedArrayBuffer` or threaded WebAssembly work when served locally.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;

pub use error::{ResolveError, ServerError};
