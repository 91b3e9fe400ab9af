//! Build state machine.
//!
//! [`transition`] is a pure function of (phase, event) that either yields the
//! next phase plus the side effects the move requires, or `None` for an event
//! the current phase does not accept. [`BuildState`] owns the project and the
//! metrics series and is the only place phase changes are recorded.

use vibeforge_common::{
    ArtifactStatus, LogEntry, MetricPoint, Phase, Project, Severity, UpsertOutcome,
};

use crate::collaborator::{AnalysisResponse, ChangedFile, PlanResponse};
use crate::errors::OrchestratorError;

pub const MAX_ITERATIONS_REACHED: &str = "Max iterations reached.";
pub const STOPPED_BY_USER: &str = "Process stopped by user.";

/// How an analysis pass ends the Testing phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisVerdict {
    /// Quality target met and the vibe check is clean.
    Converged,
    /// Not converged and budget remains: refactor and test again.
    Continue,
    /// Not converged and the iteration budget is spent.
    Exhausted,
    /// Single pass after a refinement or manual test; results are shown, not acted on.
    Surfaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildEvent {
    NewBuildRequested { has_artifacts: bool },
    PlanReceived,
    ArtifactsGenerated,
    AnalysisReceived(AnalysisVerdict),
    FixesApplied,
    RefineAccepted,
    ManualTestRequested,
    CancellationObserved,
    CollaboratorFailed,
    ProjectReset,
}

impl std::fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BuildEvent::NewBuildRequested { .. } => "new build requested",
            BuildEvent::PlanReceived => "plan received",
            BuildEvent::ArtifactsGenerated => "all artifacts generated",
            BuildEvent::AnalysisReceived(AnalysisVerdict::Converged) => "analysis converged",
            BuildEvent::AnalysisReceived(AnalysisVerdict::Continue) => "analysis needs fixes",
            BuildEvent::AnalysisReceived(AnalysisVerdict::Exhausted) => "analysis budget exhausted",
            BuildEvent::AnalysisReceived(AnalysisVerdict::Surfaced) => "analysis surfaced",
            BuildEvent::FixesApplied => "fixes applied",
            BuildEvent::RefineAccepted => "refine request accepted",
            BuildEvent::ManualTestRequested => "manual test requested",
            BuildEvent::CancellationObserved => "cancellation observed",
            BuildEvent::CollaboratorFailed => "unrecoverable collaborator error",
            BuildEvent::ProjectReset => "project reset",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Replace the project with an empty one and clear the metrics series.
    ResetProject,
    /// Append a warning to the project log.
    Warn(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub effects: Vec<SideEffect>,
}

/// The phase transition table.
pub fn transition(from: Phase, event: BuildEvent) -> Option<Transition> {
    use AnalysisVerdict::*;
    use BuildEvent::*;

    let (to, effects) = match (from, event) {
        (Phase::Idle | Phase::Stopped, NewBuildRequested { .. }) => {
            (Phase::Planning, vec![SideEffect::ResetProject])
        }
        (_, NewBuildRequested { has_artifacts: false }) => {
            (Phase::Planning, vec![SideEffect::ResetProject])
        }
        (Phase::Planning, PlanReceived) => (Phase::Coding, vec![]),
        (Phase::Coding, ArtifactsGenerated) => (Phase::Testing, vec![]),
        (Phase::Testing, AnalysisReceived(Converged | Surfaced)) => (Phase::Completed, vec![]),
        (Phase::Testing, AnalysisReceived(Continue)) => (Phase::Refining, vec![]),
        (Phase::Testing, AnalysisReceived(Exhausted)) => (
            Phase::Completed,
            vec![SideEffect::Warn(MAX_ITERATIONS_REACHED)],
        ),
        (Phase::Refining, FixesApplied) => (Phase::Testing, vec![]),
        (Phase::Completed | Phase::Failed | Phase::Testing | Phase::Coding, RefineAccepted) => {
            (Phase::Refining, vec![])
        }
        (
            Phase::Idle | Phase::Completed | Phase::Failed | Phase::Stopped,
            ManualTestRequested,
        ) => (Phase::Testing, vec![]),
        (p, CancellationObserved) if p.is_busy() => {
            (Phase::Stopped, vec![SideEffect::Warn(STOPPED_BY_USER)])
        }
        (_, CollaboratorFailed) => (Phase::Failed, vec![]),
        (_, ProjectReset) => (Phase::Idle, vec![SideEffect::ResetProject]),
        _ => return None,
    };

    Some(Transition { from, to, effects })
}

/// Whether an analysis pass inside the bounded converge loop ends it.
pub fn judge(
    analysis: &AnalysisResponse,
    iteration: u32,
    max_iterations: u32,
    quality_target: u8,
) -> AnalysisVerdict {
    if analysis.score() >= quality_target && !analysis.vibe.degraded {
        AnalysisVerdict::Converged
    } else if iteration >= max_iterations {
        AnalysisVerdict::Exhausted
    } else {
        AnalysisVerdict::Continue
    }
}

/// Project plus metrics series. All mutation of build state goes through here.
#[derive(Debug, Clone, Default)]
pub struct BuildState {
    project: Project,
    metrics: Vec<MetricPoint>,
}

impl BuildState {
    /// Wrap a restored project. The metrics series is not persisted; recover
    /// a single point from the project when it has been analyzed.
    pub fn new(project: Project) -> Self {
        let metrics = if project.iteration > 0 {
            vec![project.current_metric()]
        } else {
            Vec::new()
        };
        Self { project, metrics }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn phase(&self) -> Phase {
        self.project.phase
    }

    pub fn metrics(&self) -> &[MetricPoint] {
        &self.metrics
    }

    /// Validate and record a phase change. Rejected events are logged as a
    /// warning and reported as `InvalidTransition`.
    pub fn apply(&mut self, event: BuildEvent) -> Result<Transition, OrchestratorError> {
        let from = self.project.phase;
        let Some(transition) = transition(from, event) else {
            self.log(
                Severity::Warning,
                format!("Rejected event '{}' in phase {}", event, from),
            );
            return Err(OrchestratorError::InvalidTransition {
                phase: from,
                event: event.to_string(),
            });
        };

        for effect in &transition.effects {
            match effect {
                SideEffect::ResetProject => {
                    self.project = Project::default();
                    self.metrics.clear();
                }
                SideEffect::Warn(message) => {
                    self.log(Severity::Warning, *message);
                }
            }
        }
        self.project.phase = transition.to;
        Ok(transition)
    }

    pub fn log(&mut self, severity: Severity, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry::new(severity, message);
        self.project.logs.push(entry.clone());
        entry
    }

    /// Name the project. Called once right after a new build resets it.
    pub fn begin(&mut self, name: &str, description: &str) {
        self.project.name = name.to_string();
        self.project.description = description.to_string();
    }

    /// Seed the artifact list from a plan: empty content, status `pending`.
    pub fn seed_plan(&mut self, plan: &PlanResponse) {
        self.project.files = plan
            .files
            .iter()
            .map(|f| vibeforge_common::Artifact::pending(&f.name, &f.language))
            .collect();
    }

    pub fn set_generated(&mut self, name: &str, content: String, status: ArtifactStatus) {
        if let Some(artifact) = self.project.artifact_mut(name) {
            artifact.content = content;
            artifact.status = status;
        }
    }

    pub fn set_refactored(&mut self, name: &str, content: String) {
        self.set_generated(name, content, ArtifactStatus::Verified);
    }

    pub fn next_iteration(&mut self) -> u32 {
        self.project.iteration += 1;
        self.project.iteration
    }

    /// Replace results and score wholesale, append a metric snapshot and
    /// mark artifacts named by failing findings as buggy.
    pub fn record_analysis(&mut self, analysis: &AnalysisResponse) -> MetricPoint {
        self.project.test_results = analysis.findings();
        self.project.quality_score = analysis.score();

        let failing: Vec<_> = self.project.failing_findings().cloned().collect();
        for artifact in &mut self.project.files {
            if artifact.status != ArtifactStatus::Pending
                && failing.iter().any(|f| artifact.is_mentioned_by(f))
            {
                artifact.status = ArtifactStatus::Buggy;
            }
        }

        let point = self.project.current_metric();
        self.metrics.push(point);
        point
    }

    /// First `limit` artifacts that have content and are not configuration.
    pub fn refactor_targets(&self, limit: usize) -> Vec<vibeforge_common::Artifact> {
        self.project
            .files
            .iter()
            .filter(|f| f.has_content() && !f.is_config())
            .take(limit)
            .cloned()
            .collect()
    }

    /// Merge refinement output by name. Returns (updated, appended) counts.
    pub fn merge_refinement(&mut self, changes: &[ChangedFile]) -> (usize, usize) {
        let mut updated = 0;
        let mut appended = 0;
        for change in changes {
            match self
                .project
                .upsert_artifact(change.name.trim(), &change.language, &change.content)
            {
                UpsertOutcome::Updated => updated += 1,
                UpsertOutcome::Appended => appended += 1,
            }
        }
        (updated, appended)
    }

    pub fn set_report(&mut self, report: String) {
        self.project.report = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{PlannedFile, TestOutcome, VibeCheck};

    fn analysis(score: f64, failing: &[&str], degraded: bool) -> AnalysisResponse {
        AnalysisResponse {
            results: failing
                .iter()
                .map(|m| TestOutcome {
                    test_name: "check".into(),
                    passed: false,
                    message: m.to_string(),
                })
                .collect(),
            quality_score: score,
            vibe: VibeCheck {
                degraded,
                reason: if degraded { "duplication".into() } else { String::new() },
            },
        }
    }

    fn plan(names: &[(&str, &str)]) -> PlanResponse {
        PlanResponse {
            files: names
                .iter()
                .map(|(n, l)| PlannedFile {
                    name: n.to_string(),
                    language: l.to_string(),
                })
                .collect(),
            summary: String::new(),
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let steps = [
            (Phase::Idle, BuildEvent::NewBuildRequested { has_artifacts: false }, Phase::Planning),
            (Phase::Planning, BuildEvent::PlanReceived, Phase::Coding),
            (Phase::Coding, BuildEvent::ArtifactsGenerated, Phase::Testing),
            (
                Phase::Testing,
                BuildEvent::AnalysisReceived(AnalysisVerdict::Continue),
                Phase::Refining,
            ),
            (Phase::Refining, BuildEvent::FixesApplied, Phase::Testing),
            (
                Phase::Testing,
                BuildEvent::AnalysisReceived(AnalysisVerdict::Converged),
                Phase::Completed,
            ),
        ];
        for (from, event, to) in steps {
            let t = transition(from, event).unwrap_or_else(|| panic!("{} from {}", event, from));
            assert_eq!(t.to, to);
        }
    }

    #[test]
    fn test_exhausted_completes_with_warning() {
        let t = transition(
            Phase::Testing,
            BuildEvent::AnalysisReceived(AnalysisVerdict::Exhausted),
        )
        .unwrap();
        assert_eq!(t.to, Phase::Completed);
        assert_eq!(t.effects, vec![SideEffect::Warn(MAX_ITERATIONS_REACHED)]);
    }

    #[test]
    fn test_post_completion_refine_cycle() {
        let t = transition(Phase::Completed, BuildEvent::RefineAccepted).unwrap();
        assert_eq!(t.to, Phase::Refining);
        let t = transition(Phase::Refining, BuildEvent::FixesApplied).unwrap();
        assert_eq!(t.to, Phase::Testing);
        let t = transition(
            Phase::Testing,
            BuildEvent::AnalysisReceived(AnalysisVerdict::Surfaced),
        )
        .unwrap();
        assert_eq!(t.to, Phase::Completed);
    }

    #[test]
    fn test_refine_accepted_sources() {
        for phase in [Phase::Completed, Phase::Failed, Phase::Testing, Phase::Coding] {
            assert!(transition(phase, BuildEvent::RefineAccepted).is_some());
        }
        for phase in [Phase::Idle, Phase::Planning, Phase::Refining, Phase::Stopped] {
            assert!(transition(phase, BuildEvent::RefineAccepted).is_none());
        }
    }

    #[test]
    fn test_new_build_only_when_idle_stopped_or_empty() {
        assert!(
            transition(Phase::Completed, BuildEvent::NewBuildRequested { has_artifacts: true })
                .is_none()
        );
        assert!(
            transition(Phase::Failed, BuildEvent::NewBuildRequested { has_artifacts: false })
                .is_some()
        );
        let t =
            transition(Phase::Stopped, BuildEvent::NewBuildRequested { has_artifacts: true })
                .unwrap();
        assert_eq!(t.effects, vec![SideEffect::ResetProject]);
    }

    #[test]
    fn test_cancellation_only_from_busy_phases() {
        for phase in Phase::all() {
            let t = transition(phase, BuildEvent::CancellationObserved);
            if phase.is_busy() {
                let t = t.unwrap();
                assert_eq!(t.to, Phase::Stopped);
                assert_eq!(t.effects, vec![SideEffect::Warn(STOPPED_BY_USER)]);
            } else {
                assert!(t.is_none(), "cancellation accepted in {}", phase);
            }
        }
    }

    #[test]
    fn test_failure_from_any_phase() {
        for phase in Phase::all() {
            let t = transition(phase, BuildEvent::CollaboratorFailed).unwrap();
            assert_eq!(t.to, Phase::Failed);
        }
    }

    #[test]
    fn test_every_busy_phase_has_an_exit() {
        for phase in Phase::all().into_iter().filter(|p| p.is_busy()) {
            assert!(transition(phase, BuildEvent::CancellationObserved).is_some());
            assert!(transition(phase, BuildEvent::CollaboratorFailed).is_some());
        }
    }

    #[test]
    fn test_apply_rejects_and_logs_warning() {
        let mut state = BuildState::default();
        let err = state.apply(BuildEvent::FixesApplied).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidTransition {
                phase: Phase::Idle,
                ..
            }
        ));
        assert_eq!(state.phase(), Phase::Idle);
        let last = state.project().logs.last().unwrap();
        assert_eq!(last.severity, Severity::Warning);
        assert!(last.message.contains("fixes applied"));
    }

    #[test]
    fn test_new_build_resets_project_and_metrics() {
        let mut project = Project::new("old", "old goal");
        project.iteration = 3;
        project.quality_score = 80;
        project.phase = Phase::Stopped;
        project.files.push(vibeforge_common::Artifact::pending("a.js", "javascript"));
        let mut state = BuildState::new(project);
        assert_eq!(state.metrics().len(), 1);

        state
            .apply(BuildEvent::NewBuildRequested { has_artifacts: true })
            .unwrap();

        assert_eq!(state.phase(), Phase::Planning);
        assert_eq!(state.project().iteration, 0);
        assert_eq!(state.project().quality_score, 0);
        assert!(state.project().files.is_empty());
        assert!(state.metrics().is_empty());
    }

    #[test]
    fn test_restore_without_analysis_has_no_metrics() {
        let state = BuildState::new(Project::new("fresh", ""));
        assert!(state.metrics().is_empty());
    }

    #[test]
    fn test_judge() {
        assert_eq!(judge(&analysis(97.0, &[], false), 1, 3, 95), AnalysisVerdict::Converged);
        assert_eq!(judge(&analysis(95.0, &[], false), 3, 3, 95), AnalysisVerdict::Converged);
        assert_eq!(judge(&analysis(99.0, &[], true), 1, 3, 95), AnalysisVerdict::Continue);
        assert_eq!(judge(&analysis(60.0, &["x"], false), 2, 3, 95), AnalysisVerdict::Continue);
        assert_eq!(judge(&analysis(60.0, &["x"], false), 3, 3, 95), AnalysisVerdict::Exhausted);
    }

    #[test]
    fn test_seed_plan_and_refactor_targets() {
        let mut state = BuildState::default();
        state.seed_plan(&plan(&[
            ("package.json", "json"),
            ("index.html", "html"),
            ("app.js", "javascript"),
            ("style.css", "css"),
            ("util.js", "javascript"),
        ]));
        assert!(
            state
                .project()
                .files
                .iter()
                .all(|f| f.status == ArtifactStatus::Pending && f.content.is_empty())
        );

        for name in ["package.json", "index.html", "app.js", "util.js"] {
            state.set_generated(name, format!("// {}", name), ArtifactStatus::Created);
        }

        let targets: Vec<String> = state
            .refactor_targets(3)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(targets, vec!["index.html", "app.js", "util.js"]);
    }

    #[test]
    fn test_record_analysis_replaces_and_marks_buggy() {
        let mut state = BuildState::default();
        state.seed_plan(&plan(&[("index.html", "html"), ("app.js", "javascript")]));
        state.set_generated("index.html", "<p>".into(), ArtifactStatus::Created);
        state.set_generated("app.js", "x".into(), ArtifactStatus::Created);

        state.next_iteration();
        let point = state.record_analysis(&analysis(40.0, &["app.js throws", "no title"], false));
        assert_eq!(point.iteration, 1);
        assert_eq!(point.bug_count, 2);
        assert_eq!(state.project().artifact("app.js").unwrap().status, ArtifactStatus::Buggy);
        assert_eq!(
            state.project().artifact("index.html").unwrap().status,
            ArtifactStatus::Created
        );

        state.next_iteration();
        state.record_analysis(&analysis(90.0, &[], false));
        assert!(state.project().test_results.is_empty());
        assert_eq!(state.project().quality_score, 90);
        let iterations: Vec<u32> = state.metrics().iter().map(|m| m.iteration).collect();
        assert_eq!(iterations, vec![1, 2]);
    }

    #[test]
    fn test_merge_refinement_counts() {
        let mut state = BuildState::default();
        state.seed_plan(&plan(&[("index.html", "html")]));

        let (updated, appended) = state.merge_refinement(&[
            ChangedFile {
                name: "index.html".into(),
                content: "<main></main>".into(),
                language: "html".into(),
            },
            ChangedFile {
                name: "dark.css".into(),
                content: "body{}".into(),
                language: "css".into(),
            },
        ]);

        assert_eq!((updated, appended), (1, 1));
        assert_eq!(state.project().files.len(), 2);
        assert_eq!(state.project().files[0].content, "<main></main>");
        assert_eq!(state.project().files[1].status, ArtifactStatus::Created);
    }
}
