//! Static file serving module
//!
//! Loads a resolved file and answers with 200, 206, 304 or 416.

use hyper::body::Bytes;
use hyper::Response;
use std::io;
use std::path::Path;
use tokio::fs;

use crate::error::ResolveError;
use crate::handler::router::RequestContext;
use crate::http::cache::Validators;
use crate::http::response::{build_file_response, build_partial_response};
use crate::http::{self, mime, Body, RangeParseResult};
use crate::logger;

/// Serve a file that resolution already placed inside the root
pub async fn serve_file(
    ctx: &RequestContext<'_>,
    path: &Path,
) -> Result<Response<Body>, ResolveError> {
    let metadata = fs::metadata(path).await.map_err(|e| read_error(path, &e))?;
    let content = fs::read(path).await.map_err(|e| read_error(path, &e))?;

    let validators = Validators::new(&content, metadata.modified().ok());
    if validators.is_not_modified(ctx.if_none_match, ctx.if_modified_since) {
        return Ok(http::build_304_response(&validators));
    }

    let content_type = mime::content_type_for(path);
    let total = u64::try_from(content.len()).unwrap_or(u64::MAX);
    let data = Bytes::from(content);

    match http::parse_range_header(ctx.range_header, total) {
        RangeParseResult::Valid(range) => {
            let (Ok(start), Ok(end)) = (usize::try_from(range.start), usize::try_from(range.end))
            else {
                return Ok(http::build_416_response(total));
            };
            Ok(build_partial_response(
                data.slice(start..=end),
                content_type,
                &validators,
                range,
                total,
                ctx.is_head,
            ))
        }
        RangeParseResult::NotSatisfiable => Ok(http::build_416_response(total)),
        RangeParseResult::None => Ok(build_file_response(
            data,
            content_type,
            &validators,
            ctx.is_head,
        )),
    }
}

/// Files can vanish or lose permissions between resolution and reading
fn read_error(path: &Path, err: &io::Error) -> ResolveError {
    if err.kind() != io::ErrorKind::NotFound {
        logger::log_error(&format!("Failed to read file '{}': {err}", path.display()));
    }
    ResolveError::from_io(err)
}
