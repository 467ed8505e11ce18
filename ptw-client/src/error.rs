//! Error types for the client crate.

/// Errors surfaced by an [`AnalysisBackend`](crate::AnalysisBackend) or the
/// controller handle.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The backend holds no record for the requested key.
    #[error("not found")]
    NotFound,

    /// The configured gateway URL cannot address the API.
    #[error("invalid gateway URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The backend answered 2xx but the body did not match the expected shape.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// The controller task has shut down and no longer accepts commands.
    #[error("controller is no longer running")]
    ControllerClosed,

    /// The awaited session was replaced by a newer one before finishing.
    #[error("session {0} was superseded")]
    Superseded(crate::session::SessionId),

    /// Underlying I/O error, e.g. while reading an artifact from disk.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Transport(ptw_core::describe(&err))
        }
    }
}
