//! HTTP protocol layer module
//!
//! Protocol helpers decoupled from path resolution: isolation headers,
//! MIME detection, cache validators, Range parsing and response builders.

pub mod cache;
pub mod headers;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use headers::{apply_isolation_headers, finalize_headers, header_lines};
pub use range::{parse_range_header, RangeParseResult};
pub use response::{
    build_304_response, build_405_response, build_416_response, build_error_response,
    build_options_response, build_redirect_response, Body,
};
