//! Typed boundary to the generative code service.
//!
//! The orchestrator only sees the [`Collaborator`] trait. Each method is a
//! single suspending round trip that may fail with a [`CollaboratorError`].
//! `HttpCollaborator` is the production implementation; tests provide
//! scripted doubles.

pub mod http;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use vibeforge_common::{Artifact, Finding};

use crate::errors::CollaboratorError;

pub use http::{HttpCollaborator, HttpCollaboratorConfig};

/// Abstraction over the generative service for testability.
/// Real implementation: `HttpCollaborator`.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Produce the artifact skeleton for a goal.
    async fn plan(&self, goal: &str) -> Result<PlanResponse, CollaboratorError>;

    /// Produce the content of one artifact. `siblings` is the full current
    /// artifact set so later files can reference earlier ones.
    async fn generate_file(
        &self,
        name: &str,
        goal: &str,
        siblings: &[Artifact],
    ) -> Result<String, CollaboratorError>;

    /// Run quality and test analysis over the artifact set.
    async fn analyze(&self, files: &[Artifact]) -> Result<AnalysisResponse, CollaboratorError>;

    /// Rewrite one artifact to address the given issues.
    async fn refactor(&self, file: &Artifact, issues: &str) -> Result<String, CollaboratorError>;

    /// Write the final narrative report for a finished build.
    async fn report(&self, summary: &str) -> Result<String, CollaboratorError>;

    /// Apply a free-form user request to the project.
    async fn refine(
        &self,
        request: &str,
        files: &[Artifact],
    ) -> Result<RefineResponse, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedFile {
    pub name: String,
    #[serde(default, alias = "languageTag", alias = "language_tag")]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub files: Vec<PlannedFile>,
    #[serde(default)]
    pub summary: String,
}

impl PlanResponse {
    pub fn parse(text: &str) -> Result<Self, CollaboratorError> {
        let plan: Self = serde_json::from_str(extract_json(text))
            .map_err(|e| CollaboratorError::validation("plan", e))?;
        plan.validate()
    }

    /// Reject empty plans and unnamed files; drop duplicate names, keeping
    /// the first occurrence.
    pub fn validate(self) -> Result<Self, CollaboratorError> {
        if self.files.is_empty() {
            return Err(CollaboratorError::validation("plan", "plan contains no files"));
        }
        let mut seen = HashSet::new();
        let mut files = Vec::with_capacity(self.files.len());
        for file in self.files {
            let name = file.name.trim().to_string();
            if name.is_empty() {
                return Err(CollaboratorError::validation("plan", "file without a name"));
            }
            if seen.insert(name.clone()) {
                files.push(PlannedFile {
                    name,
                    language: file.language,
                });
            }
        }
        Ok(Self {
            files,
            summary: self.summary,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    #[serde(alias = "testName")]
    pub test_name: String,
    pub passed: bool,
    #[serde(default)]
    pub message: String,
}

/// Qualitative code-health signal returned beside the numeric score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VibeCheck {
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub results: Vec<TestOutcome>,
    #[serde(default, alias = "qualityScore")]
    pub quality_score: f64,
    #[serde(default)]
    pub vibe: VibeCheck,
}

impl AnalysisResponse {
    /// Zero score, no findings, not degraded. Stands in for a failed analysis.
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            quality_score: 0.0,
            vibe: VibeCheck::default(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, CollaboratorError> {
        serde_json::from_str(extract_json(text))
            .map_err(|e| CollaboratorError::validation("analyze", e))
    }

    /// Score clamped and rounded to 0..=100.
    pub fn score(&self) -> u8 {
        if self.quality_score.is_nan() {
            return 0;
        }
        self.quality_score.round().clamp(0.0, 100.0) as u8
    }

    pub fn bug_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.results
            .iter()
            .map(|r| Finding::new(&r.test_name, r.passed, &r.message))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "languageTag", alias = "language_tag")]
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefineResponse {
    #[serde(default, alias = "changedFiles")]
    pub changed_files: Vec<ChangedFile>,
    #[serde(default)]
    pub explanation: String,
}

impl RefineResponse {
    pub fn parse(text: &str) -> Result<Self, CollaboratorError> {
        let response: Self = serde_json::from_str(extract_json(text))
            .map_err(|e| CollaboratorError::validation("refine", e))?;
        response.validate()
    }

    pub fn validate(self) -> Result<Self, CollaboratorError> {
        if self.changed_files.iter().any(|f| f.name.trim().is_empty()) {
            return Err(CollaboratorError::validation(
                "refine",
                "changed file without a name",
            ));
        }
        Ok(self)
    }
}

/// Slice out the outermost JSON object, tolerating markdown fences and
/// leading or trailing prose.
pub fn extract_json(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Remove one surrounding markdown code fence, if present.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return text.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    lines.remove(0);
    if lines.last().is_some_and(|l| l.trim_start().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n")
}
