//! Analysis workflow controller.
//!
//! One actor task owns the active session. Commands arrive from a
//! [`ControllerHandle`]; fingerprinting, backend calls and poll ticks run as
//! spawned tasks that report back on an internal channel, tagged with the
//! [`SessionId`] that started them. A new selection or search starts a new
//! session: the previous session's in-flight work and poll timer are aborted
//! and any result it still delivers is discarded.

use std::future::Future;
use std::sync::Arc;

use ptw_core::{Fingerprint, SubmitReceipt, TaskStatus, TaskView};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::{
    backend::Artifact,
    config::ControllerConfig,
    fingerprint::{FingerprintError, Fingerprinter, Sha256Fingerprinter},
    session::{Phase, SessionId, SessionSnapshot},
    timer::PollTimer,
    AnalysisBackend, ClientError,
};

/// Message of a session whose search found no earlier analysis.
pub const NOT_FOUND_MESSAGE: &str = "Analysis not found for this hash.";
/// Message of a failed task when the backend supplied none.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed.";

const COMMAND_BUFFER: usize = 16;

// ── Messages ─────────────────────────────────────────────────────────────────

enum Command {
    Select {
        artifact: Artifact,
        reply: oneshot::Sender<SessionId>,
    },
    Search {
        query: String,
        reply: oneshot::Sender<SessionId>,
    },
    Shutdown,
}

#[derive(Debug)]
enum Event {
    Fingerprinted {
        session: SessionId,
        result: Result<Fingerprint, FingerprintError>,
    },
    LookedUp {
        session: SessionId,
        result: Result<TaskView, ClientError>,
    },
    Submitted {
        session: SessionId,
        result: Result<SubmitReceipt, ClientError>,
    },
    PollDue {
        session: SessionId,
    },
    Polled {
        session: SessionId,
        result: Result<TaskView, ClientError>,
    },
}

impl Event {
    fn session(&self) -> SessionId {
        match self {
            Event::Fingerprinted { session, .. }
            | Event::LookedUp { session, .. }
            | Event::Submitted { session, .. }
            | Event::PollDue { session }
            | Event::Polled { session, .. } => *session,
        }
    }
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Client side of a running controller.
///
/// Dropping the handle stops the controller and cancels its in-flight work.
#[derive(Debug)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    /// Start a new session for `artifact`, superseding the current one.
    ///
    /// # Errors
    /// Returns [`ClientError::ControllerClosed`] if the controller has stopped.
    pub async fn select_artifact(&self, artifact: Artifact) -> Result<SessionId, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Select { artifact, reply }).await?;
        rx.await.map_err(|_| ClientError::ControllerClosed)
    }

    /// Start a new session that looks up an earlier analysis by fingerprint.
    ///
    /// An unparsable fingerprint still starts a session; it fails without
    /// contacting the backend.
    ///
    /// # Errors
    /// Returns [`ClientError::ControllerClosed`] if the controller has stopped.
    pub async fn search(&self, query: impl Into<String>) -> Result<SessionId, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Search {
            query: query.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ClientError::ControllerClosed)
    }

    /// Current state of the active session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// A receiver notified after every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Wait until `session` reaches `completed` or `failed`.
    ///
    /// # Errors
    /// Returns [`ClientError::Superseded`] if a newer session replaced it
    /// first, and [`ClientError::ControllerClosed`] if the controller stopped.
    pub async fn wait_terminal(&self, session: SessionId) -> Result<SessionSnapshot, ClientError> {
        let mut rx = self.state.clone();
        let snapshot = rx
            .wait_for(|s| s.id > session || (s.id == session && s.phase.is_terminal()))
            .await
            .map_err(|_| ClientError::ControllerClosed)?
            .clone();
        if snapshot.id == session {
            Ok(snapshot)
        } else {
            Err(ClientError::Superseded(session))
        }
    }

    /// Stop the controller and wait for it to release its resources.
    pub async fn shutdown(self) {
        // A closed channel means the actor is already gone.
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "controller task ended abnormally");
        }
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::ControllerClosed)
    }
}

// ── Actor ────────────────────────────────────────────────────────────────────

/// Session-owning actor driving one artifact at a time through the backend.
pub struct AnalysisController<B> {
    backend: Arc<B>,
    fingerprinter: Arc<dyn Fingerprinter>,
    config: ControllerConfig,
    session: SessionSnapshot,
    artifact: Option<Artifact>,
    work: Option<JoinHandle<()>>,
    timer: PollTimer,
    events: mpsc::UnboundedSender<Event>,
    state: watch::Sender<SessionSnapshot>,
}

impl<B: AnalysisBackend + 'static> AnalysisController<B> {
    /// Spawn a controller that fingerprints with SHA-256.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(backend: B, config: ControllerConfig) -> ControllerHandle {
        Self::spawn_with_fingerprinter(backend, Arc::new(Sha256Fingerprinter), config)
    }

    /// Spawn a controller with a custom fingerprinter.
    #[must_use]
    pub fn spawn_with_fingerprinter(
        backend: B,
        fingerprinter: Arc<dyn Fingerprinter>,
        config: ControllerConfig,
    ) -> ControllerHandle {
        let (controller, events, state) = Self::new(Arc::new(backend), fingerprinter, config);
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(controller.run(command_rx, events));
        ControllerHandle {
            commands,
            state,
            task,
        }
    }

    fn new(
        backend: Arc<B>,
        fingerprinter: Arc<dyn Fingerprinter>,
        config: ControllerConfig,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<Event>,
        watch::Receiver<SessionSnapshot>,
    ) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let initial = SessionSnapshot::new(SessionId::default(), None);
        let (state, state_rx) = watch::channel(initial.clone());
        let controller = Self {
            backend,
            fingerprinter,
            config,
            session: initial,
            artifact: None,
            work: None,
            timer: PollTimer::new(),
            events,
            state,
        };
        (controller, event_rx, state_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Select { artifact, reply }) => {
                        let _ = reply.send(self.select(artifact));
                    }
                    Some(Command::Search { query, reply }) => {
                        let _ = reply.send(self.search(&query));
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = events.recv() => self.on_event(event),
            }
            self.publish();
        }
        self.teardown();
        tracing::debug!(session = %self.session.id, "controller stopped");
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    fn begin_session(&mut self, artifact_name: Option<String>) -> SessionId {
        self.abort_in_flight();
        let id = self.session.id.next();
        self.session = SessionSnapshot::new(id, artifact_name);
        self.artifact = None;
        id
    }

    fn select(&mut self, artifact: Artifact) -> SessionId {
        let session = self.begin_session(Some(artifact.file_name.clone()));
        tracing::info!(
            %session,
            artifact = %artifact.file_name,
            size = artifact.len(),
            "artifact selected"
        );
        self.enter(Phase::Hashing);

        let fingerprinter = Arc::clone(&self.fingerprinter);
        let content = artifact.content.clone();
        self.artifact = Some(artifact);
        self.spawn_work(async move {
            let result = tokio::task::spawn_blocking(move || fingerprinter.fingerprint(&content))
                .await
                .unwrap_or_else(|e| Err(FingerprintError::HashUnavailable(e.to_string())));
            Event::Fingerprinted { session, result }
        });
        session
    }

    fn search(&mut self, query: &str) -> SessionId {
        let session = self.begin_session(None);
        tracing::info!(%session, query, "fingerprint search");
        match query.parse::<Fingerprint>() {
            Ok(fingerprint) => self.lookup(fingerprint),
            Err(e) => self.fail(e.to_string()),
        }
        session
    }

    // ── Events ───────────────────────────────────────────────────────────────

    fn on_event(&mut self, event: Event) {
        if event.session() != self.session.id {
            tracing::debug!(
                stale = %event.session(),
                active = %self.session.id,
                "discarding result of superseded session"
            );
            return;
        }

        match event {
            Event::Fingerprinted { result: Ok(fingerprint), .. } => self.lookup(fingerprint),
            Event::Fingerprinted { result: Err(e), .. } => {
                tracing::warn!(
                    session = %self.session.id,
                    error = %e,
                    "submitting without fingerprint"
                );
                self.submit();
            }
            Event::LookedUp { result: Ok(view), .. } => {
                tracing::info!(
                    session = %self.session.id,
                    task_id = %view.task_id,
                    "reusing earlier analysis"
                );
                self.enter(Phase::Reusing);
                self.adopt(view);
            }
            Event::LookedUp { result: Err(ClientError::NotFound), .. } => {
                if self.artifact.is_some() {
                    self.submit();
                } else {
                    self.fail(NOT_FOUND_MESSAGE.to_owned());
                }
            }
            Event::LookedUp { result: Err(e), .. } => {
                tracing::warn!(session = %self.session.id, error = %e, "fingerprint lookup failed");
                self.fail(format!("lookup failed: {e}"));
            }
            Event::Submitted { result: Ok(receipt), .. } => self.accept(receipt),
            Event::Submitted { result: Err(e), .. } => self.fail(format!("upload failed: {e}")),
            Event::PollDue { .. } => self.poll(),
            Event::Polled { result: Ok(view), .. } => self.adopt(view),
            Event::Polled { result: Err(e), .. } => {
                self.fail(format!("status check failed: {e}"));
            }
        }
    }

    fn lookup(&mut self, fingerprint: Fingerprint) {
        self.session.fingerprint = Some(fingerprint);
        self.enter(Phase::DedupLookup);
        let session = self.session.id;
        let backend = Arc::clone(&self.backend);
        self.spawn_work(async move {
            let result = backend.result_by_fingerprint(&fingerprint).await;
            Event::LookedUp { session, result }
        });
    }

    fn submit(&mut self) {
        let Some(artifact) = self.artifact.clone() else {
            self.fail("no artifact selected".to_owned());
            return;
        };
        self.enter(Phase::Uploading);
        let session = self.session.id;
        let fingerprint = self.session.fingerprint;
        let backend = Arc::clone(&self.backend);
        self.spawn_work(async move {
            let result = backend.submit(&artifact, fingerprint.as_ref()).await;
            Event::Submitted { session, result }
        });
    }

    fn accept(&mut self, receipt: SubmitReceipt) {
        tracing::info!(
            session = %self.session.id,
            task_id = %receipt.task_id,
            status = %receipt.status,
            "submission accepted"
        );
        self.session.task_id = Some(receipt.task_id.clone());
        if self.session.fingerprint.is_none() {
            self.session.fingerprint = receipt.sha256;
        }
        if !receipt.status.is_terminal() {
            self.enter(receipt.status.into());
            self.arm_poll();
        } else if receipt.status == TaskStatus::Completed {
            // The backend already holds a finished analysis; fetch its report once.
            self.poll();
        } else {
            self.fail(
                receipt
                    .message
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_owned()),
            );
        }
    }

    fn poll(&mut self) {
        let Some(task_id) = self.session.task_id.clone() else {
            self.fail("no task to check".to_owned());
            return;
        };
        let session = self.session.id;
        let backend = Arc::clone(&self.backend);
        self.spawn_work(async move {
            let result = backend.task_status(&task_id).await;
            Event::Polled { session, result }
        });
    }

    fn adopt(&mut self, view: TaskView) {
        self.session.task_id = Some(view.task_id);
        if self.session.fingerprint.is_none() {
            self.session.fingerprint = view.sha256;
        }
        let phase = Phase::from(view.status);
        if phase.is_polling() {
            self.enter(phase);
            self.arm_poll();
            return;
        }
        if phase == Phase::Completed {
            self.session.report = view.result;
        } else {
            self.session.error = Some(
                view.error
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_owned()),
            );
        }
        self.finish(phase);
    }

    fn fail(&mut self, message: String) {
        self.session.error = Some(message);
        self.finish(Phase::Failed);
    }

    fn finish(&mut self, phase: Phase) {
        self.timer.cancel();
        self.enter(phase);
        tracing::info!(
            session = %self.session.id,
            %phase,
            task_id = ?self.session.task_id.as_ref().map(ptw_core::TaskId::as_str),
            error = ?self.session.error,
            "session finished"
        );
    }

    // ── Plumbing ─────────────────────────────────────────────────────────────

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(
            session = self.session.id.get(),
            from = %self.session.phase,
            to = %phase,
            "phase change"
        );
        self.session.enter(phase);
    }

    fn arm_poll(&mut self) {
        let session = self.session.id;
        let events = self.events.clone();
        self.timer.arm(self.config.poll_interval, move || {
            let _ = events.send(Event::PollDue { session });
        });
    }

    /// Run `work` in the single work slot and deliver its event to the actor.
    fn spawn_work<F>(&mut self, work: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let _ = events.send(work.await);
        });
        if let Some(previous) = self.work.replace(handle) {
            previous.abort();
        }
    }

    fn abort_in_flight(&mut self) {
        if self.timer.cancel() {
            tracing::debug!(session = %self.session.id, "cancelled pending status check");
        }
        if let Some(work) = self.work.take() {
            work.abort();
        }
    }

    fn teardown(&mut self) {
        self.abort_in_flight();
        self.artifact = None;
    }

    fn publish(&self) {
        self.state.send_replace(self.session.clone());
    }
}
