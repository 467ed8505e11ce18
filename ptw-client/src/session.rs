//! Observable state of one controller session.

use std::fmt;

use ptw_core::{Fingerprint, Report, TaskId, TaskStatus};

/// Monotonically increasing identity of a controller session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// The identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a session is in the submit, dedupe and poll workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Hashing,
    DedupLookup,
    Uploading,
    Reusing,
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Phase {
    /// `true` for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// `true` while the controller polls the backend for progress.
    #[must_use]
    pub const fn is_polling(self) -> bool {
        matches!(self, Phase::Pending | Phase::Processing)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Hashing => "hashing",
            Phase::DedupLookup => "dedup_lookup",
            Phase::Uploading => "uploading",
            Phase::Reusing => "reusing",
            Phase::Pending => "pending",
            Phase::Processing => "processing",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }
}

impl From<TaskStatus> for Phase {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => Phase::Pending,
            TaskStatus::Processing => Phase::Processing,
            TaskStatus::Completed => Phase::Completed,
            TaskStatus::Failed => Phase::Failed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the active session, published after every state change.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub phase: Phase,
    /// Name of the selected artifact; `None` for a search.
    pub artifact_name: Option<String>,
    pub fingerprint: Option<Fingerprint>,
    pub task_id: Option<TaskId>,
    /// Present once the session completed.
    pub report: Option<Report>,
    /// Present once the session failed.
    pub error: Option<String>,
    /// Every phase the session has entered, in order, starting at `Idle`.
    pub trail: Vec<Phase>,
}

impl SessionSnapshot {
    /// A fresh session in `Idle`.
    #[must_use]
    pub fn new(id: SessionId, artifact_name: Option<String>) -> Self {
        Self {
            id,
            phase: Phase::Idle,
            artifact_name,
            fingerprint: None,
            task_id: None,
            report: None,
            error: None,
            trail: vec![Phase::Idle],
        }
    }

    /// Move to `phase`, recording it in the trail if it differs.
    pub(crate) fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.trail.push(phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_increase() {
        let first = SessionId::default();
        assert!(first.next() > first);
        assert_eq!(first.next().to_string(), "#1");
    }

    #[test]
    fn repeated_phase_is_recorded_once() {
        let mut s = SessionSnapshot::new(SessionId::default(), None);
        s.enter(Phase::Pending);
        s.enter(Phase::Pending);
        s.enter(Phase::Processing);
        assert_eq!(s.trail, [Phase::Idle, Phase::Pending, Phase::Processing]);
    }

    #[test]
    fn terminal_and_polling_phases() {
        assert!(Phase::Completed.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Reusing.is_terminal());
        assert!(Phase::Processing.is_polling());
        assert!(!Phase::Uploading.is_polling());
        assert_eq!(Phase::from(TaskStatus::Processing), Phase::Processing);
    }
}
