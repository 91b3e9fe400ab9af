//! Chat dispatch: route each user message to a new build or a refinement and
//! keep the conversation at exactly one agent reply per accepted message.

use vibeforge_common::Phase;

use super::Orchestrator;
use super::controller::{BuildSummary, RefineSummary};
use super::state::AnalysisVerdict;
use crate::errors::OrchestratorError;

pub const STOPPED_REPLY: &str = "Process stopped.";
pub const FAILURE_REPLY: &str =
    "Something went wrong while working on that. The logs have the details; try again when ready.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    NewBuild,
    Refine,
    Reject,
}

/// Decide what a user message means in the current state.
///
/// | Phase                                  | Artifacts | Route      |
/// |----------------------------------------|-----------|------------|
/// | `idle`, `stopped`                      | any       | `NewBuild` |
/// | any                                    | none      | `NewBuild` |
/// | `completed`, `failed`, `testing`, `coding` | some  | `Refine`   |
/// | `planning`, `refining`                 | some      | `Reject`   |
pub fn route(phase: Phase, has_artifacts: bool) -> Route {
    match phase {
        Phase::Idle | Phase::Stopped => Route::NewBuild,
        _ if !has_artifacts => Route::NewBuild,
        Phase::Completed | Phase::Failed | Phase::Testing | Phase::Coding => Route::Refine,
        Phase::Planning | Phase::Refining => Route::Reject,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Succeeded,
    Stopped,
    Failed,
}

/// What happened to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub route: Route,
    pub status: DispatchStatus,
    /// The agent reply appended to the conversation.
    pub reply: String,
}

impl Orchestrator {
    /// Handle one chat message.
    ///
    /// Rejected input (`Rejected`, `EmptyMessage`) leaves the conversation
    /// untouched. Accepted input appends the user message, runs the routed
    /// operation to completion and appends exactly one agent reply, whatever
    /// the outcome.
    pub async fn dispatch(&mut self, text: &str) -> Result<DispatchOutcome, OrchestratorError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OrchestratorError::EmptyMessage);
        }

        let phase = self.phase();
        let route = route(phase, self.project().has_artifacts());
        tracing::debug!(%phase, ?route, "dispatching message");

        let result = match route {
            Route::Reject => return Err(OrchestratorError::Rejected { phase }),
            Route::NewBuild => {
                self.hear(text);
                self.start_build(text).await.map(|s| build_reply(&s))
            }
            Route::Refine => {
                self.hear(text);
                self.refine(text).await.map(|s| refine_reply(&s))
            }
        };

        let (status, reply) = match result {
            Ok(reply) => (DispatchStatus::Succeeded, reply),
            Err(OrchestratorError::Cancelled) => {
                (DispatchStatus::Stopped, STOPPED_REPLY.to_string())
            }
            Err(e) => {
                tracing::error!(?route, "dispatch failed: {}", e);
                (DispatchStatus::Failed, FAILURE_REPLY.to_string())
            }
        };
        self.say(reply.clone());

        Ok(DispatchOutcome {
            route,
            status,
            reply,
        })
    }
}

fn build_reply(summary: &BuildSummary) -> String {
    let headline = match summary.verdict {
        AnalysisVerdict::Converged => format!(
            "Built {} ({} files). Quality reached {}/100 after {} iteration(s).",
            summary.name, summary.files, summary.quality_score, summary.iteration
        ),
        _ => format!(
            "Built {} ({} files). Quality is {}/100 with {} open issue(s) after {} iteration(s).",
            summary.name,
            summary.files,
            summary.quality_score,
            summary.bug_count,
            summary.iteration
        ),
    };
    if summary.report.trim().is_empty() {
        headline
    } else {
        format!("{}\n\n{}", headline, summary.report.trim())
    }
}

fn refine_reply(summary: &RefineSummary) -> String {
    let explanation = if summary.explanation.trim().is_empty() {
        format!(
            "Updated {} file(s) and added {}.",
            summary.updated, summary.appended
        )
    } else {
        summary.explanation.trim().to_string()
    };
    format!(
        "{}\n\nQuality is now {}/100 with {} failing check(s).",
        explanation, summary.quality_score, summary.bug_count
    )
}
