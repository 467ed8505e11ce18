//! [`AnalysisBackend`] over HTTP, addressed through the gateway origin.
//!
//! Every call is a relative `/api/...` path on the configured base URL; the
//! client never learns where the analysis backend actually runs.

use std::time::Duration;

use async_trait::async_trait;
use ptw_core::{Fingerprint, HistoryEntry, SubmitReceipt, TaskId, TaskView};
use reqwest::{
    multipart::{Form, Part},
    StatusCode, Url,
};
use serde::de::DeserializeOwned;

use crate::{backend::Artifact, AnalysisBackend, ClientError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend client speaking the analysis API through the gateway.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Build a client rooted at `base_url` (e.g. `http://127.0.0.1:8080`).
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidUrl`] if the URL does not parse or is
    /// not `http`/`https`, and [`ClientError::Transport`] if the underlying
    /// client cannot be initialised.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: base_url.to_owned(),
            reason,
        };
        let base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(invalid(format!("unsupported scheme `{}`", base.scheme())));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("ptw-analyze/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base, client })
    }

    /// The gateway origin this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// List the most recent analyses, newest first.
    ///
    /// # Errors
    /// Same failure modes as [`AnalysisBackend::task_status`].
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, ClientError> {
        let url = self.endpoint(&["api", "history"])?;
        let resp = self
            .client
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await?;
        decode(resp).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl {
                url: self.base.to_string(),
                reason: "URL cannot carry a path".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl AnalysisBackend for HttpBackend {
    async fn submit(
        &self,
        artifact: &Artifact,
        fingerprint: Option<&Fingerprint>,
    ) -> Result<SubmitReceipt, ClientError> {
        let part = Part::bytes(artifact.content.to_vec())
            .file_name(artifact.file_name.clone())
            .mime_str("application/octet-stream")?;
        let mut form = Form::new().part("file", part);
        if let Some(fp) = fingerprint {
            form = form.text("sha256", fp.to_string());
        }

        let url = self.endpoint(&["api", "analyze"])?;
        tracing::debug!(
            %url,
            artifact = %artifact.file_name,
            size = artifact.len(),
            "uploading artifact"
        );
        let resp = self.client.post(url).multipart(form).send().await?;
        decode(resp).await
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskView, ClientError> {
        let url = self.endpoint(&["api", "tasks", task_id.as_str()])?;
        let resp = self.client.get(url).send().await?;
        decode(resp).await
    }

    async fn result_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<TaskView, ClientError> {
        let hex = fingerprint.to_string();
        let url = self.endpoint(&["api", "result", &hex])?;
        let resp = self.client.get(url).send().await?;
        decode(resp).await
    }
}

/// Map a response to `T`, or to the matching [`ClientError`].
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = detail_of(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .map_or_else(|| body.trim().to_owned(), str::to_owned)
        });
        return Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

/// Extract the `detail` field of a backend error body.
///
/// Validation errors carry a structured detail; it is rendered as compact JSON.
fn detail_of(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        match HttpBackend::new(base) {
            Ok(b) => b,
            Err(e) => panic!("backend: {e}"),
        }
    }

    #[test]
    fn endpoint_appends_segments_to_origin() {
        let b = backend("http://127.0.0.1:8080");
        let url = match b.endpoint(&["api", "tasks", "t-1"]) {
            Ok(u) => u,
            Err(e) => panic!("endpoint: {e}"),
        };
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/api/tasks/t-1");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let b = backend("http://gw.internal/ptw/");
        let url = match b.endpoint(&["api", "analyze"]) {
            Ok(u) => u,
            Err(e) => panic!("endpoint: {e}"),
        };
        assert_eq!(url.as_str(), "http://gw.internal/ptw/api/analyze");
    }

    #[test]
    fn endpoint_escapes_task_identifiers() {
        let b = backend("http://127.0.0.1:8080");
        let url = match b.endpoint(&["api", "tasks", "a/b c"]) {
            Ok(u) => u,
            Err(e) => panic!("endpoint: {e}"),
        };
        assert_eq!(url.path(), "/api/tasks/a%2Fb%20c");
    }

    #[test]
    fn non_http_base_is_rejected() {
        assert!(matches!(
            HttpBackend::new("ftp://example.com"),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpBackend::new("not a url"),
            Err(ClientError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn detail_is_extracted_from_error_bodies() {
        assert_eq!(
            detail_of(r#"{"detail":"File too large"}"#).as_deref(),
            Some("File too large")
        );
        assert_eq!(
            detail_of(r#"{"detail":[{"loc":["file"]}]}"#).as_deref(),
            Some(r#"[{"loc":["file"]}]"#)
        );
        assert_eq!(detail_of("<html>502</html>"), None);
        assert_eq!(detail_of(r#"{"message":"x"}"#), None);
    }
}
