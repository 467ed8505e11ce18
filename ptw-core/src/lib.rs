//! Core types shared by the PTW edge gateway and the analysis client.
//!
//! Defines the content fingerprint used as the deduplication key, the task
//! projection the client observes, and the report payload model.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod id;
pub mod report;
pub mod task;

pub use error::{describe, CoreError};
pub use id::{Fingerprint, TaskId};
pub use report::{Indicator, MalwareReport, Report, RiskLevel, Technique};
pub use task::{HistoryEntry, SubmitReceipt, TaskStatus, TaskView};
