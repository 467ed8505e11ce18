//! Streaming reverse proxy for requests under the reserved API prefix.
//!
//! The inbound body is handed to a hyper client as-is and the backend's
//! `Incoming` body is handed back to axum as-is, so neither side is buffered
//! and hyper's flow control applies end to end. The proxy knows nothing
//! about the backend's API; it only rewrites the request target and `Host`.

use std::time::Duration;

use axum::{
    body::Body,
    extract::Request,
    http::{header, uri::PathAndQuery, Version},
    response::Response,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::{config::ProxyTarget, error::GatewayError};

/// Byte-transparent tunnel to one backend.
#[derive(Debug, Clone)]
pub struct ReverseProxy {
    target: ProxyTarget,
    client: Client<HttpConnector, Body>,
}

impl ReverseProxy {
    /// Build a proxy with a pooled HTTP/1.1 client.
    ///
    /// `connect_timeout` bounds only connection establishment; a slow but
    /// live backend response is streamed for as long as it takes.
    #[must_use]
    pub fn new(target: ProxyTarget, connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { target, client }
    }

    /// The backend this proxy forwards to.
    #[must_use]
    pub fn target(&self) -> &ProxyTarget {
        &self.target
    }

    /// Forward `req` to the backend and relay the backend's response.
    ///
    /// Method, path, query and every header except `Host` are passed through
    /// unchanged; the status and headers of the response are relayed
    /// verbatim. No retries are attempted.
    ///
    /// # Errors
    /// Returns [`GatewayError::BadGateway`] when the backend cannot be
    /// reached or the exchange fails at the connection level, and
    /// [`GatewayError::ServerFault`] if the outbound URI cannot be built.
    pub async fn forward(&self, req: Request) -> Result<Response, GatewayError> {
        let (mut parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        parts.uri = self
            .target
            .uri_for(path_and_query)
            .map_err(|e| GatewayError::ServerFault(format!("build backend uri: {e}")))?;
        parts.headers.insert(header::HOST, self.target.host_header().clone());
        // The pooled client speaks HTTP/1.1 only, whatever the browser used.
        parts.version = Version::HTTP_11;

        let method = parts.method.clone();
        let path = parts.uri.path().to_owned();
        let upstream = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|err| {
                let diagnostic = ptw_core::describe(&err);
                tracing::warn!(
                    %method,
                    %path,
                    backend = %self.target,
                    error = %diagnostic,
                    "backend request failed"
                );
                GatewayError::BadGateway(diagnostic)
            })?;

        tracing::debug!(%method, %path, status = %upstream.status(), "backend responded");
        Ok(upstream.map(Body::new))
    }
}
