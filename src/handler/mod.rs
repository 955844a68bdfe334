//! Request handler module
//!
//! Resolves request paths under the served root and turns them into file,
//! listing, redirect or error responses.

pub mod listing;
pub mod resolve;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::{handle_request, RequestContext};
