//! End-to-end tests for the gateway router.
//!
//! Static tests run against a temporary SPA build; proxy tests run against a
//! real loopback axum server standing in for the analysis backend.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use http_body_util::BodyExt;
use ptw_gateway::{
    config::{GatewayConfig, ProxyTarget},
    routes::{create_router, Gateway},
};
use serde_json::{json, Value};
use tower::ServiceExt;

const INDEX_HTML: &str = "<!doctype html><div id=\"root\"></div>";
const SECRET: &str = "backend-credentials";

struct Site {
    dir: tempfile::TempDir,
}

impl Site {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let dist = dir.path().join("dist");
        std::fs::create_dir_all(dist.join("assets")).expect("mkdir assets");
        std::fs::write(dist.join("index.html"), INDEX_HTML).expect("write index");
        std::fs::write(dist.join("assets/app.js"), "export const x = 1;").expect("write js");
        std::fs::write(dist.join("assets/logo.svg"), "<svg/>").expect("write svg");
        std::fs::write(dist.join("assets/blob.bin"), [0u8, 1, 2, 3]).expect("write bin");
        std::fs::write(dir.path().join("secret.txt"), SECRET).expect("write secret");
        Self { dir }
    }

    fn dist(&self) -> std::path::PathBuf {
        self.dir.path().join("dist")
    }

    fn router(&self, backend: &str) -> Router {
        let target = ProxyTarget::parse(backend).expect("backend url");
        let config = GatewayConfig::new(self.dist(), target);
        let gateway = Gateway::from_config(&config).expect("gateway");
        create_router(Arc::new(gateway))
    }
}

/// Echo every request back as JSON with a distinctive status and header.
async fn echo(req: axum::extract::Request) -> Response {
    let (host, trace) = {
        let header_str = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_owned()
        };
        (header_str("host"), header_str("x-client-trace"))
    };
    let method = req.method().to_string();
    let uri = req.uri().to_string();
    let body = axum::body::to_bytes(req.into_body(), 8 << 20)
        .await
        .expect("read request body");
    (
        StatusCode::CREATED,
        [("x-backend", "ptw-test")],
        Json(json!({
            "method": method,
            "uri": uri,
            "host": host,
            "trace": trace,
            "body_len": body.len(),
        })),
    )
        .into_response()
}

async fn spawn_backend() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind backend");
    let addr = listener.local_addr().expect("backend addr");
    tokio::spawn(async move {
        let app = Router::new().fallback(echo);
        axum::serve(listener, app).await.expect("backend server");
    });
    addr
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    let resp = app.oneshot(req).await.expect("router is infallible");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    (status, headers, bytes.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn cache_control(headers: &header::HeaderMap) -> Option<&str> {
    headers.get(header::CACHE_CONTROL).and_then(|v| v.to_str().ok())
}

// ── Static assets ────────────────────────────────────────────────────────────

#[tokio::test]
async fn existing_asset_is_served_with_its_content_type() {
    let site = Site::new();
    let (status, headers, body) =
        send(site.router("http://127.0.0.1:9"), get("/assets/app.js")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("text/javascript; charset=utf-8")
    );
    assert_eq!(cache_control(&headers), None, "assets carry no cache directive");
    assert_eq!(body, b"export const x = 1;");
}

#[tokio::test]
async fn unknown_extension_is_octet_stream() {
    let site = Site::new();
    let (status, headers, body) =
        send(site.router("http://127.0.0.1:9"), get("/assets/blob.bin")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/octet-stream")
    );
    assert_eq!(body, [0u8, 1, 2, 3]);
}

#[tokio::test]
async fn unknown_routes_fall_back_to_entry_document_without_caching() {
    let site = Site::new();
    for path in ["/", "/reports/abc123", "/assets", "/assets/missing.js", "/api"] {
        let (status, headers, body) = send(site.router("http://127.0.0.1:9"), get(path)).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(cache_control(&headers), Some("no-store"), "{path}");
        assert_eq!(
            headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("text/html; charset=utf-8"),
            "{path}"
        );
        assert_eq!(body, INDEX_HTML.as_bytes(), "{path}");
    }
}

#[tokio::test]
async fn entry_document_requested_directly_is_not_cached() {
    let site = Site::new();
    let (status, headers, _) = send(site.router("http://127.0.0.1:9"), get("/index.html")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_control(&headers), Some("no-store"));
}

#[tokio::test]
async fn asset_range_request_is_partial() {
    let site = Site::new();
    let req = Request::builder()
        .uri("/assets/app.js")
        .header(header::RANGE, "bytes=0-5")
        .body(Body::empty())
        .expect("request");
    let (status, headers, body) = send(site.router("http://127.0.0.1:9"), req).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        headers.get(header::CONTENT_RANGE).and_then(|v| v.to_str().ok()),
        Some("bytes 0-5/19")
    );
    assert_eq!(body, b"export");
}

#[tokio::test]
async fn traversal_attempts_never_leave_the_static_root() {
    let site = Site::new();
    for path in [
        "/../secret.txt",
        "/assets/../../secret.txt",
        "/%2e%2e/secret.txt",
        "/%2E%2E%2Fsecret.txt",
        "/..%2f..%2fsecret.txt",
        "/%2e%2e%5c..%5csecret.txt",
        "/%ff%fe",
    ] {
        let (status, headers, body) = send(site.router("http://127.0.0.1:9"), get(path)).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(cache_control(&headers), Some("no-store"), "{path}");
        assert_eq!(body, INDEX_HTML.as_bytes(), "{path} must fall back to the SPA");
        assert!(
            !String::from_utf8_lossy(&body).contains(SECRET),
            "{path} leaked a file outside the root"
        );
    }
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_out_of_root_falls_back() {
    let site = Site::new();
    std::os::unix::fs::symlink(site.dir.path().join("secret.txt"), site.dist().join("leak.txt"))
        .expect("symlink");
    let (_, _, body) = send(site.router("http://127.0.0.1:9"), get("/leak.txt")).await;
    assert_eq!(body, INDEX_HTML.as_bytes());
}

// ── Reverse proxy ────────────────────────────────────────────────────────────

#[tokio::test]
async fn api_request_preserves_method_path_and_query() {
    let site = Site::new();
    let backend = spawn_backend().await;
    let app = site.router(&format!("http://{backend}"));

    let req = Request::builder()
        .method("POST")
        .uri("/api/analyze?priority=high&tag=a%20b")
        .header(header::HOST, "analysis.example.com")
        .header("x-client-trace", "trace-7")
        .body(Body::from("MZ-payload"))
        .expect("request");
    let (status, headers, body) = send(app, req).await;

    assert_eq!(status, StatusCode::CREATED, "backend status must be relayed");
    assert_eq!(
        headers.get("x-backend").and_then(|v| v.to_str().ok()),
        Some("ptw-test"),
        "backend headers must be relayed"
    );
    let echoed: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["uri"], "/api/analyze?priority=high&tag=a%20b");
    assert_eq!(echoed["trace"], "trace-7", "other headers pass through");
    assert_eq!(echoed["body_len"], 10);
}

#[tokio::test]
async fn api_request_host_header_is_rewritten_to_backend_authority() {
    let site = Site::new();
    let backend = spawn_backend().await;

    for inbound_host in [Some("evil.example"), Some("localhost:8080"), None] {
        let app = site.router(&format!("http://{backend}"));
        let mut builder = Request::builder().uri("/api/tasks/42");
        if let Some(host) = inbound_host {
            builder = builder.header(header::HOST, host);
        }
        let (status, _, body) = send(app, builder.body(Body::empty()).expect("request")).await;
        assert_eq!(status, StatusCode::CREATED);
        let echoed: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(echoed["host"], backend.to_string(), "inbound host {inbound_host:?}");
    }
}

#[tokio::test]
async fn large_upload_streams_through_unchanged() {
    let site = Site::new();
    let backend = spawn_backend().await;
    let app = site.router(&format!("http://{backend}"));

    let payload = vec![0x5a_u8; 3 * 1024 * 1024];
    let req = Request::builder()
        .method("PUT")
        .uri("/api/upload")
        .body(Body::from(payload))
        .expect("request");
    let (status, _, body) = send(app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    let echoed: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(echoed["body_len"], 3 * 1024 * 1024);
}

#[tokio::test]
async fn refused_backend_connection_is_bad_gateway() {
    let site = Site::new();
    let app = site.router(&format!("http://127.0.0.1:{}", closed_port()));

    let (status, headers, body) = send(app, get("/api/result/abc")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(cache_control(&headers), Some("no-store"));
    let text = String::from_utf8_lossy(&body);
    assert!(text.starts_with("Bad Gateway: "), "unexpected body: {text}");
    assert!(!text.contains("<!doctype"), "API paths never fall back to static content");
}
