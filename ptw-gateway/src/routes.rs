//! Request dispatch for the PTW edge gateway.
//!
//! Every request lands in [`dispatch`]: malformed targets are refused, the
//! reserved API prefix is tunnelled to the backend, and everything else is
//! served from the static root with SPA fallback.

use std::{any::Any, net::SocketAddr, path::Path, sync::Arc};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use mime::Mime;
use tower::ServiceExt;
use tower_http::{catch_panic::CatchPanicLayer, services::ServeFile, trace::TraceLayer};

use crate::{
    config::{ConfigError, GatewayConfig, API_PREFIX},
    error::GatewayError,
    proxy::ReverseProxy,
    static_files::{content_type_for, StaticRoot},
};

// ── Shared state ─────────────────────────────────────────────────────────────

/// Read-only state shared by every connection handler.
#[derive(Debug)]
pub struct Gateway {
    static_root: StaticRoot,
    proxy: ReverseProxy,
}

type SharedGateway = Arc<Gateway>;

impl Gateway {
    /// Open the static root and build the backend client.
    ///
    /// # Errors
    /// Returns [`ConfigError::StaticRoot`] if the static root is unusable.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            static_root: StaticRoot::open(&config.static_root)?,
            proxy: ReverseProxy::new(config.backend.clone(), config.connect_timeout),
        })
    }

    /// The sandboxed static root.
    #[must_use]
    pub fn static_root(&self) -> &StaticRoot {
        &self.static_root
    }

    /// The reverse proxy used for API traffic.
    #[must_use]
    pub fn proxy(&self) -> &ReverseProxy {
        &self.proxy
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the application router around a shared gateway.
pub fn create_router(gateway: SharedGateway) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(gateway)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// Route one request: bad request, API proxy, or static asset.
pub async fn dispatch(State(gateway): State<SharedGateway>, req: Request) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let path = req.uri().path();

    if !path.starts_with('/') {
        tracing::debug!(?peer, uri = %req.uri(), "request without origin-form path");
        return GatewayError::BadRequest.into_response();
    }

    if path.starts_with(API_PREFIX) {
        tracing::debug!(?peer, method = %req.method(), path, "proxying to backend");
        return gateway
            .proxy
            .forward(req)
            .await
            .unwrap_or_else(IntoResponse::into_response);
    }

    serve_static(&gateway.static_root, req)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// Serve a static asset, falling back to the entry document.
async fn serve_static(root: &StaticRoot, req: Request) -> Result<Response, GatewayError> {
    match root.resolve(req.uri().path()).await {
        Ok(file) => {
            let is_entry = file == root.index_document();
            serve_file(&file, is_entry, req).await
        }
        Err(reason) => {
            tracing::debug!(path = req.uri().path(), %reason, "serving entry document");
            serve_file(root.index_document(), true, req).await
        }
    }
}

/// Hand an already-resolved file to [`ServeFile`] with the fixed MIME table.
///
/// The entry document is marked `no-store`: it decides which client bundle
/// the browser loads, so a stale copy would pin an old build. A missing entry
/// document is a server fault rather than a 404.
async fn serve_file(path: &Path, is_entry: bool, req: Request) -> Result<Response, GatewayError> {
    let mime: Mime = content_type_for(path)
        .parse()
        .map_err(|e| GatewayError::ServerFault(format!("content type: {e}")))?;
    let mut response = match ServeFile::new_with_mime(path, &mime).oneshot(req).await {
        Ok(resp) => resp.map(Body::new),
        Err(never) => match never {},
    };
    if is_entry {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::ServerFault(format!(
                "entry document {} is missing",
                path.display()
            )));
        }
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
    Ok(response)
}

/// Turn a handler panic into the generic server-error response.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    tracing::error!(panic = %detail, "handler panicked");
    GatewayError::ServerFault("internal fault".to_owned()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    use crate::config::ProxyTarget;

    fn test_gateway(dist: &Path) -> SharedGateway {
        // Nothing listens on port 9 (discard) in the test environment; API
        // requests are not exercised here.
        let target = match ProxyTarget::parse("http://127.0.0.1:9") {
            Ok(t) => t,
            Err(e) => panic!("target: {e}"),
        };
        let config = GatewayConfig::new(dist.to_path_buf(), target);
        match Gateway::from_config(&config) {
            Ok(g) => Arc::new(g),
            Err(e) => panic!("gateway: {e}"),
        }
    }

    #[tokio::test]
    async fn asterisk_form_request_is_bad_request() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir: {e}"),
        };
        let app = create_router(test_gateway(dir.path()));
        let req = match Request::builder().method("OPTIONS").uri("*").body(Body::empty()) {
            Ok(r) => r,
            Err(e) => panic!("failed to build request: {e}"),
        };
        let resp = match app.oneshot(req).await {
            Ok(r) => r,
            Err(e) => panic!("handler error: {e}"),
        };
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_entry_document_is_server_error() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir: {e}"),
        };
        let app = create_router(test_gateway(dir.path()));
        let req = match Request::builder().uri("/dashboard").body(Body::empty()) {
            Ok(r) => r,
            Err(e) => panic!("failed to build request: {e}"),
        };
        let resp = match app.oneshot(req).await {
            Ok(r) => r,
            Err(e) => panic!("handler error: {e}"),
        };
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panic_response_is_plain_server_error() {
        let resp = panic_response(Box::new("boom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"text/plain; charset=utf-8"[..])
        );
    }
}
