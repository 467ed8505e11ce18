//! Analysis backend abstraction trait.
//!
//! The controller drives the submit, dedupe and poll workflow through this
//! trait so the HTTP client can be swapped for a scripted one in tests.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use ptw_core::{Fingerprint, SubmitReceipt, TaskId, TaskView};

use crate::ClientError;

/// An artifact selected for analysis: its display name and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub content: Bytes,
}

impl Artifact {
    /// Wrap in-memory content.
    #[must_use]
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    /// Read an artifact from disk, naming it after the file's final component.
    ///
    /// # Errors
    /// Returns [`ClientError::Io`] if the file cannot be read.
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let content = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "artifact".to_owned(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(file_name, content))
    }

    /// Size of the artifact in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// `true` for a zero-byte artifact.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// The three backend operations the workflow controller depends on.
///
/// # Cancel Safety
/// The controller aborts in-flight calls when a session is superseded.
/// Implementations must tolerate their futures being dropped at any await
/// point.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Upload an artifact, passing its fingerprint when one was computed.
    ///
    /// # Errors
    /// Returns [`ClientError::Rejected`] if the backend refuses the upload and
    /// [`ClientError::Transport`] if it cannot be reached.
    async fn submit(
        &self,
        artifact: &Artifact,
        fingerprint: Option<&Fingerprint>,
    ) -> Result<SubmitReceipt, ClientError>;

    /// Fetch the current state of a task.
    ///
    /// # Errors
    /// Returns [`ClientError::Rejected`], [`ClientError::Transport`] or
    /// [`ClientError::InvalidResponse`] when no usable view is obtained.
    async fn task_status(&self, task_id: &TaskId) -> Result<TaskView, ClientError>;

    /// Look up a previous analysis of content with this fingerprint.
    ///
    /// # Errors
    /// Returns [`ClientError::NotFound`] when the backend has never seen the
    /// fingerprint; any other variant is a genuine failure.
    async fn result_by_fingerprint(&self, fingerprint: &Fingerprint)
        -> Result<TaskView, ClientError>;
}
