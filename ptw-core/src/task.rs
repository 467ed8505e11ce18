use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{Fingerprint, TaskId};
use crate::report::Report;

/// Lifecycle status of a backend analysis task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// A worker is analysing the artifact.
    Processing,
    /// Analysis finished; a report is available.
    Completed,
    /// Analysis aborted; an error message may be available.
    Failed,
}

impl TaskStatus {
    /// Returns `true` for `Completed` and `Failed`. No polling happens past these.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Read-only projection of a backend task, as returned by the status and
/// fingerprint-lookup endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct TaskView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Present once the task is `Completed`.
    #[serde(default, alias = "report", skip_serializing_if = "Option::is_none")]
    pub result: Option<Report>,
    /// Present when the task is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskView {
    /// Create a view with only the identifier and status set.
    #[must_use]
    pub fn new(task_id: TaskId, status: TaskStatus) -> Self {
        Self {
            task_id,
            status,
            sha256: None,
            filename: None,
            result: None,
            error: None,
        }
    }

    /// Attach a report.
    #[must_use]
    pub fn with_report(mut self, report: Report) -> Self {
        self.result = Some(report);
        self
    }

    /// Attach an error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Acknowledgement returned by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SubmitReceipt {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Fingerprint>,
}

impl SubmitReceipt {
    /// Create a receipt with the given identifier and initial status.
    #[must_use]
    pub fn new(task_id: TaskId, status: TaskStatus) -> Self {
        Self {
            task_id,
            status,
            message: None,
            sha256: None,
        }
    }
}

/// One row of the backend's recent-analysis listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct HistoryEntry {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default)]
    pub sha256: Option<Fingerprint>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}
