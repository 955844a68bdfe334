//! End-to-end tests: a real server on an ephemeral port, spoken to over raw TCP

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use isoserve::config::{AppState, Cli, Config};
use isoserve::server::Server;
use isoserve::ServerError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const WASM_BYTES: &[u8] = b"\0asm\x01\0\0\0\x01\x05\x01\x60\0\x01\x7f";

struct RunningServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
    _root: tempfile::TempDir,
}

impl RunningServer {
    async fn shutdown(self) -> SocketAddr {
        self.stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("server did not stop")
            .unwrap();
        self.addr
    }
}

struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<!doctype html><h1>demo</h1>\n").unwrap();
    std::fs::create_dir(dir.path().join("pkg")).unwrap();
    std::fs::write(dir.path().join("pkg/app.wasm"), WASM_BYTES).unwrap();
    std::fs::write(dir.path().join("pkg/app.js"), "export default 1;\n").unwrap();
    dir
}

fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::load(&Cli {
        host: Some("127.0.0.1".to_string()),
        port: Some(0),
        root: Some(root.to_path_buf()),
        ..Cli::default()
    })
    .unwrap();
    config.logging.access_log = false;
    config.performance.shutdown_timeout = 1;
    config
}

async fn start() -> RunningServer {
    let root = site();
    let state = Arc::new(AppState::new(test_config(root.path())).unwrap());
    let server = Server::bind(state).unwrap();
    let addr = server.local_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));
    RunningServer {
        addr,
        stop,
        task,
        _root: root,
    }
}

async fn request(addr: SocketAddr, raw: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut buf))
        .await
        .expect("response timed out")
        .unwrap();
    buf
}

fn parse(raw: &[u8]) -> RawResponse {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator");
    let head = std::str::from_utf8(&raw[..split]).unwrap();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status = status_line.split(' ').nth(1).unwrap().parse().unwrap();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    RawResponse {
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

async fn get(addr: SocketAddr, method: &str, target: &str, extra: &str) -> RawResponse {
    let raw = format!(
        "{method} {target} HTTP/1.1\r\nHost: localhost\r\n{extra}Connection: close\r\n\r\n"
    );
    parse(&request(addr, &raw).await)
}

fn assert_isolated(response: &RawResponse, what: &str) {
    assert_eq!(
        response.headers.get("cross-origin-embedder-policy").map(String::as_str),
        Some("require-corp"),
        "{what}"
    );
    assert_eq!(
        response.headers.get("cross-origin-opener-policy").map(String::as_str),
        Some("same-origin"),
        "{what}"
    );
}

#[tokio::test]
async fn test_serves_file_bytes_with_isolation_headers() {
    let server = start().await;

    let response = get(server.addr, "GET", "/index.html", "").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<!doctype html><h1>demo</h1>\n");
    assert_eq!(response.headers["content-type"], "text/html; charset=utf-8");
    assert_isolated(&response, "index.html");

    let response = get(server.addr, "GET", "/pkg/app.wasm", "").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, WASM_BYTES);
    assert_eq!(response.headers["content-type"], "application/wasm");
    assert_isolated(&response, "app.wasm");

    server.shutdown().await;
}

#[tokio::test]
async fn test_error_responses_are_isolated() {
    let server = start().await;

    let cases = [
        ("GET", "/missing.js", 404),
        ("GET", "/../../etc/passwd", 403),
        ("GET", "/pkg/%2e%2e/%2e%2e/etc/passwd", 403),
        ("GET", "/pkg", 301),
        ("DELETE", "/index.html", 405),
        ("GET", "/index.html/", 404),
        ("GET", "//pkg", 301),
    ];
    for (method, target, status) in cases {
        let response = get(server.addr, method, target, "").await;
        assert_eq!(response.status, status, "{method} {target}");
        assert_isolated(&response, target);
    }

    server.shutdown().await;
}

/// Send `raw` from a separate task and read whatever comes back; the
/// server may close before the whole request was read
async fn request_lossy(addr: SocketAddr, raw: Vec<u8>) -> Vec<u8> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    let sender = tokio::spawn(async move {
        let _ = writer.write_all(&raw).await;
        writer
    });

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let read_all = async {
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), read_all)
        .await
        .expect("response timed out");
    drop(sender.await);
    buf
}

#[tokio::test]
async fn test_malformed_requests_are_isolated() {
    let server = start().await;

    let response = parse(&request(server.addr, "GARBAGE\r\n\r\n").await);
    assert_eq!(response.status, 400);
    assert_isolated(&response, "unparsable request line");
    assert_eq!(response.headers["server"], "isoserve");

    let oversized = format!(
        "GET / HTTP/1.1\r\nHost: localhost\r\nX-Big: {}\r\n\r\n",
        "a".repeat(500 * 1024)
    );
    let response = parse(&request_lossy(server.addr, oversized.into_bytes()).await);
    assert_eq!(response.status, 431);
    assert_isolated(&response, "oversized headers");

    server.shutdown().await;
}

#[tokio::test]
async fn test_double_slash_redirect_stays_on_origin() {
    let server = start().await;

    let response = get(server.addr, "GET", "//pkg", "").await;
    assert_eq!(response.status, 301);
    assert_eq!(response.headers["location"], "/pkg/");

    let response = get(server.addr, "GET", "//pkg/", "").await;
    assert_eq!(response.status, 200);
    assert!(String::from_utf8(response.body)
        .unwrap()
        .contains("Directory listing for /pkg/"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_head_has_headers_but_no_body() {
    let server = start().await;

    let response = get(server.addr, "HEAD", "/pkg/app.js", "").await;
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
    assert_eq!(response.headers["content-length"], "18");
    assert_isolated(&response, "HEAD");

    server.shutdown().await;
}

#[tokio::test]
async fn test_conditional_get_returns_304() {
    let server = start().await;

    let first = get(server.addr, "GET", "/pkg/app.js", "").await;
    let etag = first.headers["etag"].clone();

    let second = get(
        server.addr,
        "GET",
        "/pkg/app.js",
        &format!("If-None-Match: {etag}\r\n"),
    )
    .await;
    assert_eq!(second.status, 304);
    assert!(second.body.is_empty());
    assert_isolated(&second, "304");

    server.shutdown().await;
}

#[tokio::test]
async fn test_range_request() {
    let server = start().await;

    let response = get(server.addr, "GET", "/pkg/app.wasm", "Range: bytes=0-3\r\n").await;
    assert_eq!(response.status, 206);
    assert_eq!(response.body, &WASM_BYTES[..4]);
    assert_eq!(
        response.headers["content-range"],
        format!("bytes 0-3/{}", WASM_BYTES.len())
    );
    assert_isolated(&response, "206");

    let response = get(server.addr, "GET", "/pkg/app.wasm", "Range: bytes=999-\r\n").await;
    assert_eq!(response.status, 416);
    assert_isolated(&response, "416");

    server.shutdown().await;
}

#[tokio::test]
async fn test_directory_redirect_and_listing() {
    let server = start().await;

    let redirect = get(server.addr, "GET", "/pkg", "").await;
    assert_eq!(redirect.status, 301);
    assert_eq!(redirect.headers["location"], "/pkg/");

    let listing = get(server.addr, "GET", "/pkg/", "").await;
    assert_eq!(listing.status, 200);
    let html = String::from_utf8(listing.body).unwrap();
    assert!(html.contains("app.wasm"));
    assert!(html.contains("app.js"));
    assert_isolated(&redirect, "redirect");

    let index = get(server.addr, "GET", "/", "").await;
    assert_eq!(index.status, 200);
    assert_eq!(index.body, b"<!doctype html><h1>demo</h1>\n");

    server.shutdown().await;
}

#[tokio::test]
async fn test_keep_alive_serves_several_requests() {
    let server = start().await;

    let raw = "GET /pkg/app.js HTTP/1.1\r\nHost: localhost\r\n\r\n\
               GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    let bytes = request(server.addr, raw).await;
    let text = String::from_utf8_lossy(&bytes);
    assert_eq!(text.matches("HTTP/1.1 200 OK").count(), 1);
    assert_eq!(text.matches("HTTP/1.1 404 Not Found").count(), 1);
    assert_eq!(text.matches("cross-origin-opener-policy: same-origin").count(), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_listener() {
    let server = start().await;
    let addr = server.shutdown().await;
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_second_server_on_same_port_fails() {
    let server = start().await;

    let root = site();
    let mut config = test_config(root.path());
    config.server.port = server.addr.port();
    let state = Arc::new(AppState::new(config).unwrap());

    match Server::bind(state) {
        Err(ServerError::Bind { addr, .. }) => assert_eq!(addr.port(), server.addr.port()),
        Err(other) => panic!("expected bind error, got {other}"),
        Ok(_) => panic!("second bind unexpectedly succeeded"),
    }

    // The first server keeps serving
    let response = get(server.addr, "GET", "/index.html", "").await;
    assert_eq!(response.status, 200);

    server.shutdown().await;
}
