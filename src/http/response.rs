//! HTTP response building module
//!
//! Builders for every status the server emits. None of them add the
//! isolation headers; that happens once, in the request handler.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    ACCEPT_RANGES, ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    LAST_MODIFIED, LOCATION,
};
use hyper::http::response::Builder;
use hyper::{Response, StatusCode};

use super::cache::Validators;
use super::range::ByteRange;

pub type Body = Full<Bytes>;

const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";
/// Development server: always revalidate so rebuilt assets show up at once
const CACHE_POLICY: &str = "no-cache";

/// Plain-text error page, e.g. `404 Not Found`
pub fn build_error_response(status: StatusCode) -> Response<Body> {
    let text = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Error")
    );
    let builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(CONTENT_LENGTH, text.len());
    finish(builder, Bytes::from(text), status)
}

/// 304 Not Modified
pub fn build_304_response(validators: &Validators) -> Response<Body> {
    let builder = with_validators(
        Response::builder().status(StatusCode::NOT_MODIFIED),
        validators,
    )
    .header(CACHE_CONTROL, CACHE_POLICY);
    finish(builder, Bytes::new(), StatusCode::NOT_MODIFIED)
}

/// 405 Method Not Allowed
pub fn build_405_response() -> Response<Body> {
    let mut response = build_error_response(StatusCode::METHOD_NOT_ALLOWED);
    response
        .headers_mut()
        .insert(ALLOW, hyper::header::HeaderValue::from_static(ALLOWED_METHODS));
    response
}

/// 204 answer to `OPTIONS`
pub fn build_options_response() -> Response<Body> {
    let builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, ALLOWED_METHODS);
    finish(builder, Bytes::new(), StatusCode::NO_CONTENT)
}

/// 301 to the canonical (slash-terminated) directory URL
pub fn build_redirect_response(location: &str) -> Response<Body> {
    let builder = Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .header(CONTENT_LENGTH, 0);
    finish(builder, Bytes::new(), StatusCode::MOVED_PERMANENTLY)
}

/// 416 Range Not Satisfiable
pub fn build_416_response(total: u64) -> Response<Body> {
    let mut response = build_error_response(StatusCode::RANGE_NOT_SATISFIABLE);
    if let Ok(value) = format!("bytes */{total}").parse() {
        response.headers_mut().insert(CONTENT_RANGE, value);
    }
    response
}

/// 200 with an HTML page (directory listings)
pub fn build_html_response(content: String, is_head: bool) -> Response<Body> {
    let content_length = content.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(content)
    };

    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .header(CONTENT_LENGTH, content_length)
        .header(CACHE_CONTROL, CACHE_POLICY);
    finish(builder, body, StatusCode::OK)
}

/// 200 with the full file
pub fn build_file_response(
    data: Bytes,
    content_type: &str,
    validators: &Validators,
    is_head: bool,
) -> Response<Body> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    let builder = with_validators(Response::builder().status(StatusCode::OK), validators)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, content_length)
        .header(ACCEPT_RANGES, "bytes")
        .header(CACHE_CONTROL, CACHE_POLICY);
    finish(builder, body, StatusCode::OK)
}

/// 206 with one byte range of the file
pub fn build_partial_response(
    data: Bytes,
    content_type: &str,
    validators: &Validators,
    range: ByteRange,
    total: u64,
    is_head: bool,
) -> Response<Body> {
    let body = if is_head { Bytes::new() } else { data };

    let builder = with_validators(
        Response::builder().status(StatusCode::PARTIAL_CONTENT),
        validators,
    )
    .header(CONTENT_TYPE, content_type)
    .header(CONTENT_LENGTH, range.length())
    .header(CONTENT_RANGE, range.content_range(total))
    .header(ACCEPT_RANGES, "bytes")
    .header(CACHE_CONTROL, CACHE_POLICY);
    finish(builder, body, StatusCode::PARTIAL_CONTENT)
}

fn with_validators(builder: Builder, validators: &Validators) -> Builder {
    let builder = builder.header(ETAG, validators.etag.as_str());
    match &validators.last_modified {
        Some(date) => builder.header(LAST_MODIFIED, date.as_str()),
        None => builder,
    }
}

/// Attach the body; a builder error degrades to an empty response with the
/// intended status
fn finish(builder: Builder, body: Bytes, status: StatusCode) -> Response<Body> {
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        crate::logger::log_error(&format!("Failed to build {status} response: {e}"));
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    })
}
