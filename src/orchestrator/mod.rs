//! The build orchestrator.
//!
//! One [`Orchestrator`] owns one session: the project, its metrics series and
//! the conversation. It drives builds, refinements and manual test runs
//! against a [`Collaborator`], persists through a [`SessionStore`] after each
//! mutation and publishes [`SessionEvent`]s for observers.
//!
//! Operations take `&mut self`, so at most one of them runs at a time per
//! orchestrator. Stopping goes through a cloned [`CancellationGate`].

pub mod cancel;
pub mod controller;
pub mod dispatch;
pub mod session;
pub mod state;

pub use cancel::CancellationGate;
pub use controller::{BuildSummary, RefineSummary, TestSummary};
pub use dispatch::{DispatchOutcome, DispatchStatus, Route, route};
pub use session::{Session, SessionEvent};
pub use state::{AnalysisVerdict, BuildEvent, BuildState, SideEffect, Transition};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use vibeforge_common::{Message, MetricPoint, Phase, Project, Severity};

use crate::collaborator::Collaborator;
use crate::errors::OrchestratorError;
use crate::store::SessionStore;

const EVENT_CAPACITY: usize = 256;

/// Tunables for the converge loop and collaborator calls.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Upper bound on analysis passes in one build.
    pub max_iterations: u32,
    /// Score at or above which a clean build converges.
    pub quality_target: u8,
    /// Artifacts refactored per refine step.
    pub max_refactor_targets: usize,
    pub call_timeout: Duration,
    /// Pause between per-artifact generation calls.
    pub pacing: Duration,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            quality_target: 95,
            max_refactor_targets: 3,
            call_timeout: Duration::from_secs(180),
            pacing: Duration::ZERO,
        }
    }
}

pub struct Orchestrator {
    session: Session,
    collaborator: Arc<dyn Collaborator>,
    store: Arc<dyn SessionStore>,
    gate: CancellationGate,
    settings: BuildSettings,
    events: broadcast::Sender<SessionEvent>,
}

impl Orchestrator {
    /// Start with an empty session. Nothing is read from the store.
    pub fn new(
        session_id: &str,
        collaborator: Arc<dyn Collaborator>,
        store: Arc<dyn SessionStore>,
        settings: BuildSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            session: Session::new(session_id),
            collaborator,
            store,
            gate: CancellationGate::new(),
            settings,
            events,
        }
    }

    /// Resume a persisted session. Missing or unreadable data yields an empty
    /// session; the metrics series is recovered as a single point.
    pub fn restore(
        session_id: &str,
        collaborator: Arc<dyn Collaborator>,
        store: Arc<dyn SessionStore>,
        settings: BuildSettings,
    ) -> Self {
        let mut orchestrator = Self::new(session_id, collaborator, store, settings);

        match orchestrator.store.load_project(session_id) {
            Ok(Some(project)) => {
                tracing::info!(
                    session = session_id,
                    phase = %project.phase,
                    files = project.files.len(),
                    "restored project"
                );
                orchestrator.session.state = BuildState::new(project);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(session = session_id, "could not load project: {:#}", e),
        }

        match orchestrator.store.load_conversation(session_id) {
            Ok(Some(conversation)) => orchestrator.session.conversation = conversation,
            Ok(None) => {}
            Err(e) => tracing::warn!(session = session_id, "could not load conversation: {:#}", e),
        }

        orchestrator
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn project(&self) -> &Project {
        self.session.state.project()
    }

    pub fn phase(&self) -> Phase {
        self.session.state.phase()
    }

    pub fn metrics(&self) -> &[MetricPoint] {
        self.session.state.metrics()
    }

    pub fn conversation(&self) -> &[Message] {
        &self.session.conversation
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Handle for stopping the operation in flight from another task.
    pub fn gate(&self) -> CancellationGate {
        self.gate.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the operation in flight, or the next one if it has not reached a
    /// checkpoint yet.
    pub fn stop(&self) {
        self.gate.stop();
    }

    /// Discard the project and its metrics. The conversation is kept.
    pub fn reset_project(&mut self) -> Result<(), OrchestratorError> {
        let from = self.phase();
        self.apply(BuildEvent::ProjectReset)?;
        tracing::info!(session = %self.session.id, %from, "reset the project");
        self.publish_artifacts();
        Ok(())
    }

    /// Discard the project, metrics and conversation, and clear the store.
    pub fn new_project(&mut self) {
        let from = self.phase();
        if let Err(e) = self.reset_project() {
            tracing::warn!("reset rejected: {}", e);
            return;
        }
        self.session.conversation.clear();
        if let Err(e) = self.store.clear(&self.session.id) {
            tracing::warn!(session = %self.session.id, "failed to clear session store: {:#}", e);
        }
        tracing::info!(session = %self.session.id, %from, "started a new project");
    }

    // ── Internals shared by the controller and the router ───────────

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Apply a phase event, publishing the change and any log lines it wrote.
    fn apply(&mut self, event: BuildEvent) -> Result<(), OrchestratorError> {
        let logged_before = self.project().logs.len();
        let result = self.session.state.apply(event);
        self.publish_logs_since(logged_before);
        let transition = result?;

        tracing::debug!(from = %transition.from, to = %transition.to, %event, "phase transition");
        self.emit(SessionEvent::PhaseChanged {
            from: transition.from,
            to: transition.to,
        });
        self.persist_project();
        Ok(())
    }

    fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let logged_before = self.project().logs.len();
        self.session.state.log(severity, message);
        self.publish_logs_since(logged_before);
    }

    fn publish_logs_since(&self, index: usize) {
        for entry in self.project().logs.iter().skip(index) {
            match entry.severity {
                Severity::Error => tracing::error!("{}", entry.message),
                Severity::Warning => tracing::warn!("{}", entry.message),
                Severity::Info | Severity::Success | Severity::System => {
                    tracing::info!(severity = entry.severity.as_str(), "{}", entry.message)
                }
            }
            self.emit(SessionEvent::Log {
                entry: entry.clone(),
            });
        }
    }

    fn publish_artifacts(&self) {
        self.emit(SessionEvent::ArtifactsUpdated {
            files: self.project().files.clone(),
        });
    }

    fn hear(&mut self, text: &str) {
        self.session.conversation.push(Message::user(text));
        self.persist_conversation();
    }

    fn say(&mut self, text: impl Into<String>) {
        let message = Message::agent(text);
        self.session.conversation.push(message.clone());
        self.persist_conversation();
        self.emit(SessionEvent::AgentMessage { message });
    }

    /// Store failures are reported and otherwise ignored; in-memory state
    /// stays authoritative.
    fn persist_project(&self) {
        if let Err(e) = self.store.save_project(&self.session.id, self.project()) {
            tracing::warn!(session = %self.session.id, "failed to persist project: {:#}", e);
        }
    }

    fn persist_conversation(&self) {
        if let Err(e) = self
            .store
            .save_conversation(&self.session.id, &self.session.conversation)
        {
            tracing::warn!(session = %self.session.id, "failed to persist conversation: {:#}", e);
        }
    }
}
