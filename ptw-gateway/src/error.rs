//! Error types for the gateway crate.
//!
//! Every variant renders as a short plain-text diagnostic with
//! `Cache-Control: no-store`; the browser never sees a JSON error from the
//! gateway itself.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Errors that can occur while dispatching a single request.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The request line carried no usable origin-form path.
    #[error("Bad Request")]
    BadRequest,

    /// The backend could not be reached or dropped the connection.
    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    /// An unexpected local fault, e.g. the entry document is unreadable.
    #[error("Server error: {0}")]
    ServerFault(String),
}

impl GatewayError {
    /// HTTP status the error is reported with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest => StatusCode::BAD_REQUEST,
            GatewayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            GatewayError::ServerFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::ServerFault(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        }
        (
            status,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            self.to_string(),
        )
            .into_response()
    }
}
