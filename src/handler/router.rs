//! Request dispatch module
//!
//! Entry point for HTTP request processing: method validation, path
//! resolution, dispatch to file or listing, and the final header pass that
//! puts the isolation headers on every response.

use hyper::body::Body as HttpBody;
use hyper::header::{HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE, REFERER, USER_AGENT};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::error::ResolveError;
use crate::handler::resolve::{self, Resolved};
use crate::handler::{listing, static_files};
use crate::http::{self, response::build_html_response, Body};
use crate::logger::{self, AccessLogEntry};

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    /// Percent-encoded URI path
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_none_match: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
    pub range_header: Option<&'a str>,
}

/// Main entry point for HTTP request handling.
///
/// Wraps the static-file dispatcher and finalizes headers on whatever it
/// produced, so success and error responses alike carry the isolation
/// headers.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Body>, Infallible> {
    let started = Instant::now();
    // Request bodies are never read
    let (parts, _) = req.into_parts();

    logger::log_headers_count(parts.headers.len(), state.config.logging.show_headers);

    let mut response = dispatch(&parts, &state).await;
    http::finalize_headers(
        response.headers_mut(),
        state.server_header.as_ref(),
        &state.extra_headers,
    );

    if state.cached_access_log.load(Ordering::Relaxed) {
        log_access(&parts, &response, peer_addr, started, &state);
    }
    Ok(response)
}

async fn dispatch(parts: &Parts, state: &AppState) -> Response<Body> {
    match parts.method {
        Method::GET | Method::HEAD => {}
        Method::OPTIONS => return http::build_options_response(),
        ref method => {
            logger::log_debug(&format!("Method not allowed: {method}"));
            return http::build_405_response();
        }
    }

    let ctx = RequestContext {
        path: parts.uri.path(),
        query: parts.uri.query(),
        is_head: parts.method == Method::HEAD,
        if_none_match: header_str(&parts.headers, IF_NONE_MATCH),
        if_modified_since: header_str(&parts.headers, IF_MODIFIED_SINCE),
        range_header: header_str(&parts.headers, RANGE),
    };

    match serve(&ctx, state).await {
        Ok(response) => response,
        Err(err) => {
            logger::log_debug(&format!("{} -> {err}", ctx.path));
            http::build_error_response(err.status())
        }
    }
}

async fn serve(ctx: &RequestContext<'_>, state: &AppState) -> Result<Response<Body>, ResolveError> {
    match resolve::resolve(&state.root, ctx.path, &state.config.http.index_files).await? {
        Resolved::File(path) => static_files::serve_file(ctx, &path).await,
        Resolved::Directory { path, request_path } => {
            if !state.config.http.directory_listing {
                return Err(ResolveError::Forbidden);
            }
            let html = listing::render_directory(&path, &request_path).await?;
            Ok(build_html_response(html, ctx.is_head))
        }
        Resolved::Redirect(location) => {
            let location = match ctx.query {
                Some(query) => format!("{location}?{query}"),
                None => location,
            };
            Ok(http::build_redirect_response(&location))
        }
    }
}

fn header_str<K: hyper::header::AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn log_access(
    parts: &Parts,
    response: &Response<Body>,
    peer_addr: SocketAddr,
    started: Instant,
    state: &AppState,
) {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = AccessLogEntry::version_label(parts.version).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = HttpBody::size_hint(response.body()).exact().unwrap_or(0);
    entry.referer = header_str(&parts.headers, REFERER).map(ToString::to_string);
    entry.user_agent = header_str(&parts.headers, USER_AGENT).map(ToString::to_string);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Config};
    use http_body_util::{BodyExt, Empty};
    use hyper::body::Bytes;
    use hyper::header::{ALLOW, CONTENT_TYPE, LOCATION};
    use hyper::StatusCode;

    fn state_for(root: &std::path::Path, listing: bool) -> Arc<AppState> {
        let mut config = Config::load(&Cli {
            root: Some(root.to_path_buf()),
            no_listing: !listing,
            ..Cli::default()
        })
        .unwrap();
        config.logging.access_log = false;
        Arc::new(AppState::new(config).unwrap())
    }

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/app.wasm"), b"\0asm").unwrap();
        dir
    }

    async fn send(state: &Arc<AppState>, method: Method, uri: &str) -> Response<Body> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Empty::<Bytes>::new())
            .unwrap();
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        handle_request(req, Arc::clone(state), peer).await.unwrap()
    }

    fn assert_isolated(response: &Response<Body>) {
        assert_eq!(
            response.headers()["cross-origin-embedder-policy"],
            "require-corp"
        );
        assert_eq!(response.headers()["cross-origin-opener-policy"], "same-origin");
    }

    #[tokio::test]
    async fn test_index_html_scenario() {
        let dir = site();
        let state = state_for(dir.path(), true);
        let response = send(&state, Method::GET, "/index.html").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_isolated(&response);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "<h1>hi</h1>");
    }

    #[tokio::test]
    async fn test_every_status_is_isolated() {
        let dir = site();
        let state = state_for(dir.path(), false);
        let cases = [
            (Method::GET, "/", StatusCode::OK),
            (Method::HEAD, "/pkg/app.wasm", StatusCode::OK),
            (Method::GET, "/pkg", StatusCode::MOVED_PERMANENTLY),
            (Method::GET, "/pkg/", StatusCode::FORBIDDEN),
            (Method::GET, "/missing.js", StatusCode::NOT_FOUND),
            (Method::GET, "/../etc/passwd", StatusCode::FORBIDDEN),
            (Method::GET, "/%ff", StatusCode::BAD_REQUEST),
            (Method::POST, "/index.html", StatusCode::METHOD_NOT_ALLOWED),
            (Method::OPTIONS, "/", StatusCode::NO_CONTENT),
        ];
        for (method, uri, status) in cases {
            let response = send(&state, method.clone(), uri).await;
            assert_eq!(response.status(), status, "{method} {uri}");
            assert_isolated(&response);
        }
    }

    #[tokio::test]
    async fn test_redirect_keeps_query() {
        let dir = site();
        let state = state_for(dir.path(), true);
        let response = send(&state, Method::GET, "/pkg?debug=1").await;
        assert_eq!(response.headers()[LOCATION], "/pkg/?debug=1");

        // A leading `//` would make the location protocol-relative
        let response = send(&state, Method::GET, "//pkg?debug=1").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[LOCATION], "/pkg/?debug=1");
        assert_isolated(&response);
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let dir = site();
        let state = state_for(dir.path(), true);
        let response = send(&state, Method::GET, "/pkg/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("Directory listing for /pkg/"));
        assert!(html.contains("app.wasm"));
    }

    #[tokio::test]
    async fn test_options_and_405_allow() {
        let dir = site();
        let state = state_for(dir.path(), true);
        let response = send(&state, Method::DELETE, "/index.html").await;
        assert_eq!(response.headers()[ALLOW], "GET, HEAD, OPTIONS");
        let response = send(&state, Method::OPTIONS, "/index.html").await;
        assert_eq!(response.headers()[ALLOW], "GET, HEAD, OPTIONS");
    }

    #[tokio::test]
    async fn test_extra_headers_applied() {
        let dir = site();
        let mut config = Config::load(&Cli {
            root: Some(dir.path().to_path_buf()),
            ..Cli::default()
        })
        .unwrap();
        config.logging.access_log = false;
        config
            .http
            .headers
            .insert("cross-origin-resource-policy".to_string(), "same-origin".to_string());
        let state = Arc::new(AppState::new(config).unwrap());

        let response = send(&state, Method::GET, "/missing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()["cross-origin-resource-policy"],
            "same-origin"
        );
        assert_eq!(response.headers()["server"], "isoserve");
        assert_isolated(&response);
    }
}
