//! Iteration controller: the PLAN → CODE → (TEST ⇄ REFINE)* → REPORT loop,
//! plus the single-pass refinement and manual test entry points.
//!
//! Failure policy per collaborator operation:
//!
//! | Operation       | On failure                                        |
//! |-----------------|---------------------------------------------------|
//! | `plan`          | fatal, build fails                                |
//! | `generate_file` | absorbed, placeholder content, artifact `buggy`   |
//! | `analyze`       | absorbed, scored as 0 with no findings            |
//! | `refactor`      | fatal, build fails                                |
//! | `report`        | fatal, build fails                                |
//! | `refine`        | fatal to the refinement turn                      |

use std::future::Future;
use std::sync::Arc;

use vibeforge_common::{ArtifactStatus, Project, Severity};

use super::{Orchestrator, SessionEvent};
use super::state::{AnalysisVerdict, BuildEvent, judge};
use crate::collaborator::AnalysisResponse;
use crate::errors::{CollaboratorError, OrchestratorError};

/// Result of a finished build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub name: String,
    pub files: usize,
    pub iteration: u32,
    pub quality_score: u8,
    pub bug_count: usize,
    pub verdict: AnalysisVerdict,
    pub report: String,
}

/// Result of a finished refinement turn.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineSummary {
    pub explanation: String,
    pub updated: usize,
    pub appended: usize,
    pub quality_score: u8,
    pub bug_count: usize,
}

/// Result of a manual test run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestSummary {
    pub iteration: u32,
    pub quality_score: u8,
    pub bug_count: usize,
    pub degraded: bool,
}

impl Orchestrator {
    /// Run a full build for `goal`. The project is reset first.
    ///
    /// Returns `Cancelled` when stopped (phase `stopped`) and `Collaborator`
    /// on an unrecoverable call failure (phase `failed`).
    pub async fn start_build(&mut self, goal: &str) -> Result<BuildSummary, OrchestratorError> {
        let has_artifacts = self.project().has_artifacts();
        self.apply(BuildEvent::NewBuildRequested { has_artifacts })?;

        self.session.state.begin(&project_name(goal), goal);
        self.publish_artifacts();
        self.log(Severity::System, format!("New build: {}", goal));

        let result = self.run_build(goal).await;
        self.settle(result)
    }

    async fn run_build(&mut self, goal: &str) -> Result<BuildSummary, OrchestratorError> {
        self.plan_step(goal).await?;
        self.code_step(goal).await?;
        let verdict = self.converge().await?;
        let report = self.report_step(verdict).await?;

        let project = self.project();
        Ok(BuildSummary {
            name: project.name.clone(),
            files: project.files.len(),
            iteration: project.iteration,
            quality_score: project.quality_score,
            bug_count: project.bug_count(),
            verdict,
            report,
        })
    }

    /// Apply a free-form change request to the current artifacts, then run a
    /// single analysis pass. Results are surfaced; nothing is auto-refactored.
    pub async fn refine(&mut self, request: &str) -> Result<RefineSummary, OrchestratorError> {
        self.apply(BuildEvent::RefineAccepted)?;
        let result = self.run_refine(request).await;
        self.settle(result)
    }

    async fn run_refine(&mut self, request: &str) -> Result<RefineSummary, OrchestratorError> {
        self.log(Severity::Info, "Applying change request...");
        let collaborator = Arc::clone(&self.collaborator);
        let files = self.project().files.clone();
        let response = self
            .call("refine", collaborator.refine(request, &files))
            .await?;

        let (updated, appended) = self.session.state.merge_refinement(&response.changed_files);
        self.publish_artifacts();
        self.log(
            Severity::Success,
            format!("Updated {} file(s), added {}", updated, appended),
        );
        self.apply(BuildEvent::FixesApplied)?;

        let analysis = self.analysis_pass().await?;
        self.apply(BuildEvent::AnalysisReceived(AnalysisVerdict::Surfaced))?;

        Ok(RefineSummary {
            explanation: response.explanation,
            updated,
            appended,
            quality_score: analysis.score(),
            bug_count: analysis.bug_count(),
        })
    }

    /// One analysis pass over the current artifacts, outside any build.
    pub async fn run_manual_test(&mut self) -> Result<TestSummary, OrchestratorError> {
        let phase = self.phase();
        if phase.is_busy() {
            return Err(OrchestratorError::Rejected { phase });
        }
        if !self.project().has_artifacts() {
            return Err(OrchestratorError::NothingToTest);
        }

        self.apply(BuildEvent::ManualTestRequested)?;
        let result = self.run_manual_pass().await;
        self.settle(result)
    }

    async fn run_manual_pass(&mut self) -> Result<TestSummary, OrchestratorError> {
        let analysis = self.analysis_pass().await?;
        self.apply(BuildEvent::AnalysisReceived(AnalysisVerdict::Surfaced))?;
        Ok(TestSummary {
            iteration: self.project().iteration,
            quality_score: analysis.score(),
            bug_count: analysis.bug_count(),
            degraded: analysis.vibe.degraded,
        })
    }

    /// Map how an operation ended onto the phase machine. An observed stop is
    /// consumed here so it cannot cancel the next operation.
    fn settle<T>(
        &mut self,
        result: Result<T, OrchestratorError>,
    ) -> Result<T, OrchestratorError> {
        match result {
            Ok(value) => Ok(value),
            Err(OrchestratorError::Cancelled) => {
                self.gate.reset();
                let _ = self.apply(BuildEvent::CancellationObserved);
                Err(OrchestratorError::Cancelled)
            }
            Err(e) => {
                self.log(Severity::Error, format!("Operation failed: {}", e));
                let _ = self.apply(BuildEvent::CollaboratorFailed);
                Err(e)
            }
        }
    }

    /// One collaborator round trip bounded by the call timeout, with a
    /// cancellation checkpoint on each side. A result that arrives after a
    /// stop is discarded.
    async fn call<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, OrchestratorError> {
        self.gate.checkpoint()?;
        let outcome = tokio::time::timeout(self.settings.call_timeout, request).await;
        self.gate.checkpoint()?;

        match outcome {
            Ok(result) => result.map_err(OrchestratorError::from),
            Err(_) => Err(CollaboratorError::Timeout {
                operation,
                seconds: self.settings.call_timeout.as_secs(),
            }
            .into()),
        }
    }

    async fn plan_step(&mut self, goal: &str) -> Result<(), OrchestratorError> {
        self.log(Severity::Info, "Planning project structure...");
        let collaborator = Arc::clone(&self.collaborator);
        let plan = self.call("plan", collaborator.plan(goal)).await?;

        self.session.state.seed_plan(&plan);
        self.publish_artifacts();
        self.log(
            Severity::Success,
            format!("Plan ready: {} file(s)", plan.files.len()),
        );
        if !plan.summary.trim().is_empty() {
            self.log(Severity::Info, plan.summary.trim().to_string());
        }
        self.apply(BuildEvent::PlanReceived)
    }

    async fn code_step(&mut self, goal: &str) -> Result<(), OrchestratorError> {
        let names: Vec<String> = self.project().files.iter().map(|f| f.name.clone()).collect();

        for (index, name) in names.iter().enumerate() {
            self.gate.checkpoint()?;
            if index > 0 && !self.settings.pacing.is_zero() {
                tokio::time::sleep(self.settings.pacing).await;
                self.gate.checkpoint()?;
            }

            self.log(Severity::Info, format!("Writing {}...", name));
            let collaborator = Arc::clone(&self.collaborator);
            let siblings = self.project().files.clone();

            match self
                .call("generate_file", collaborator.generate_file(name, goal, &siblings))
                .await
            {
                Ok(content) => {
                    self.session
                        .state
                        .set_generated(name, content, ArtifactStatus::Created);
                }
                Err(OrchestratorError::Collaborator(e)) => {
                    self.log(
                        Severity::Warning,
                        format!("Could not generate {}: {}", name, e),
                    );
                    let language = self
                        .project()
                        .artifact(name)
                        .map(|a| a.language.clone())
                        .unwrap_or_default();
                    self.session.state.set_generated(
                        name,
                        placeholder(name, &language, &e.to_string()),
                        ArtifactStatus::Buggy,
                    );
                }
                Err(e) => return Err(e),
            }
            self.publish_artifacts();
            self.persist_project();
        }

        self.apply(BuildEvent::ArtifactsGenerated)
    }

    /// Bounded TEST ⇄ REFINE loop. Leaves the phase at `testing`; the report
    /// step makes the final move.
    async fn converge(&mut self) -> Result<AnalysisVerdict, OrchestratorError> {
        loop {
            let analysis = self.analysis_pass().await?;
            let verdict = judge(
                &analysis,
                self.project().iteration,
                self.settings.max_iterations,
                self.settings.quality_target,
            );

            match verdict {
                AnalysisVerdict::Continue => {
                    self.apply(BuildEvent::AnalysisReceived(verdict))?;
                    self.refactor_step(&analysis).await?;
                    self.apply(BuildEvent::FixesApplied)?;
                }
                _ => return Ok(verdict),
            }
        }
    }

    /// Increment the iteration, analyze, and fold the results into the state.
    /// A failed analysis scores the pass as 0 with no findings.
    async fn analysis_pass(&mut self) -> Result<AnalysisResponse, OrchestratorError> {
        self.gate.checkpoint()?;
        let iteration = self.session.state.next_iteration();
        self.log(
            Severity::Info,
            format!("Running analysis (iteration {})...", iteration),
        );

        let collaborator = Arc::clone(&self.collaborator);
        let files = self.project().files.clone();
        let analysis = match self.call("analyze", collaborator.analyze(&files)).await {
            Ok(analysis) => analysis,
            Err(OrchestratorError::Collaborator(e)) => {
                self.log(
                    Severity::Warning,
                    format!("Analysis unavailable, scoring this pass as 0: {}", e),
                );
                AnalysisResponse::empty()
            }
            Err(e) => return Err(e),
        };

        let point = self.session.state.record_analysis(&analysis);
        self.emit(SessionEvent::MetricRecorded { point });
        self.log(
            Severity::Info,
            format!(
                "Quality {}/100 with {} failing check(s)",
                point.quality_score, point.bug_count
            ),
        );
        if analysis.vibe.degraded {
            let reason = if analysis.vibe.reason.trim().is_empty() {
                "no reason given"
            } else {
                analysis.vibe.reason.trim()
            };
            self.log(Severity::Warning, format!("Vibe check degraded: {}", reason));
        }
        self.publish_artifacts();
        self.persist_project();
        Ok(analysis)
    }

    async fn refactor_step(
        &mut self,
        analysis: &AnalysisResponse,
    ) -> Result<(), OrchestratorError> {
        let issues = issue_context(analysis);
        let targets = self
            .session
            .state
            .refactor_targets(self.settings.max_refactor_targets);
        if targets.is_empty() {
            self.log(Severity::Warning, "No code files to refactor");
        }

        for target in targets {
            self.log(Severity::Info, format!("Refactoring {}...", target.name));
            let collaborator = Arc::clone(&self.collaborator);
            let content = self
                .call("refactor", collaborator.refactor(&target, &issues))
                .await?;
            self.session.state.set_refactored(&target.name, content);
            self.publish_artifacts();
            self.persist_project();
        }
        Ok(())
    }

    async fn report_step(&mut self, verdict: AnalysisVerdict) -> Result<String, OrchestratorError> {
        self.log(Severity::Info, "Writing final report...");
        let summary = build_summary_text(self.project(), verdict);
        let collaborator = Arc::clone(&self.collaborator);
        let report = self.call("report", collaborator.report(&summary)).await?;

        self.session.state.set_report(report.clone());
        self.apply(BuildEvent::AnalysisReceived(verdict))?;
        if verdict == AnalysisVerdict::Converged {
            self.log(
                Severity::Success,
                format!("Build converged at quality {}/100", self.project().quality_score),
            );
        }
        Ok(report)
    }
}

/// Short project name derived from the goal.
pub fn project_name(goal: &str) -> String {
    let slug = slugify(goal, 40);
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

fn slugify(text: &str, max_len: usize) -> String {
    let slug: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.len() > max_len {
        slug[..max_len].trim_end_matches('-').to_string()
    } else {
        slug
    }
}

/// Issue text handed to every refactor call in one refine step: failing
/// findings, plus the code-health complaint when the vibe check degraded.
pub fn issue_context(analysis: &AnalysisResponse) -> String {
    let mut issues: Vec<String> = analysis
        .results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| format!("- {}: {}", r.test_name, r.message))
        .collect();
    if analysis.vibe.degraded {
        issues.push(format!(
            "- Code health degraded: {}. Remove duplication and dead code, and keep one consistent pattern.",
            analysis.vibe.reason.trim()
        ));
    }
    issues.join("\n")
}

fn build_summary_text(project: &Project, verdict: AnalysisVerdict) -> String {
    let outcome = match verdict {
        AnalysisVerdict::Converged => "converged on the quality target",
        AnalysisVerdict::Exhausted => "stopped at the iteration limit",
        AnalysisVerdict::Continue | AnalysisVerdict::Surfaced => "finished",
    };
    let files = project
        .files
        .iter()
        .map(|f| format!("- {} ({}, {})", f.name, f.language, f.status.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    let failing = project
        .failing_findings()
        .map(|f| format!("- {}: {}", f.test_name, f.message))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Project: {}\nGoal: {}\nOutcome: {} after {} iteration(s)\nQuality: {}/100\n\nFiles:\n{}\n\nOpen issues:\n{}",
        project.name,
        project.description,
        outcome,
        project.iteration,
        project.quality_score,
        files,
        if failing.is_empty() { "- none".to_string() } else { failing }
    )
}

/// Stand-in content for an artifact whose generation failed, commented in
/// the artifact's own language where possible.
pub fn placeholder(name: &str, language: &str, reason: &str) -> String {
    let text = format!("Generation failed for {}: {}", name, reason.replace('\n', " "));
    match language.trim().to_lowercase().as_str() {
        "html" | "xml" | "svg" | "markdown" | "md" => format!("<!-- {} -->\n", text),
        "css" | "scss" | "less" => format!("/* {} */\n", text),
        "python" | "py" | "ruby" | "rb" | "shell" | "bash" | "sh" | "yaml" | "yml" | "toml" => {
            format!("# {}\n", text)
        }
        "sql" | "lua" | "haskell" => format!("-- {}\n", text),
        "json" => format!("{{\"error\": {}}}\n", serde_json::Value::String(text)),
        _ => format!("// {}\n", text),
    }
}
