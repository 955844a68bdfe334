//! Cross-origin isolation headers
//!
//! Browsers only expose `SharedArrayBuffer` (needed by threaded WebAssembly)
//! to cross-origin isolated documents. Every response this server emits
//! carries both headers below, whatever its status.

use hyper::header::{HeaderMap, HeaderName, HeaderValue, SERVER};

pub const CROSS_ORIGIN_EMBEDDER_POLICY: &str = "cross-origin-embedder-policy";
pub const CROSS_ORIGIN_EMBEDDER_POLICY_VALUE: &str = "require-corp";
pub const CROSS_ORIGIN_OPENER_POLICY: &str = "cross-origin-opener-policy";
pub const CROSS_ORIGIN_OPENER_POLICY_VALUE: &str = "same-origin";

/// Insert both isolation headers, replacing any existing values
pub fn apply_isolation_headers(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static(CROSS_ORIGIN_EMBEDDER_POLICY),
        HeaderValue::from_static(CROSS_ORIGIN_EMBEDDER_POLICY_VALUE),
    );
    headers.insert(
        HeaderName::from_static(CROSS_ORIGIN_OPENER_POLICY),
        HeaderValue::from_static(CROSS_ORIGIN_OPENER_POLICY_VALUE),
    );
}

/// Final header pass applied to every response.
///
/// Order matters: configured extras cannot override the isolation headers.
pub fn finalize_headers(
    headers: &mut HeaderMap,
    server: Option<&HeaderValue>,
    extra: &HeaderMap,
) {
    if let Some(server) = server {
        headers.insert(SERVER, server.clone());
    }
    for (name, value) in extra {
        headers.insert(name.clone(), value.clone());
    }
    apply_isolation_headers(headers);
}

/// The headers `finalize_headers` would add to an empty response, rendered
/// as raw `name: value\r\n` lines for responses that bypass the handler
pub fn header_lines(server: Option<&HeaderValue>, extra: &HeaderMap) -> Vec<u8> {
    let mut headers = HeaderMap::new();
    finalize_headers(&mut headers, server, extra);

    let mut lines = Vec::with_capacity(128);
    for (name, value) in &headers {
        lines.extend_from_slice(name.as_str().as_bytes());
        lines.extend_from_slice(b": ");
        lines.extend_from_slice(value.as_bytes());
        lines.extend_from_slice(b"\r\n");
    }
    lines
}
