use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// Language tags that mark an artifact as data or configuration rather than
/// code. Such artifacts are never chosen as refactor targets.
const CONFIG_LANGUAGES: &[&str] = &[
    "json", "yaml", "yml", "toml", "ini", "xml", "csv", "env", "dotenv", "config", "conf", "lock",
    "properties",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    #[default]
    Pending,
    Created,
    Verified,
    Buggy,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::Verified => "verified",
            Self::Buggy => "buggy",
        }
    }
}

/// One named unit of generated content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique key within a project, usually a relative path (`src/app.js`)
    pub name: String,
    /// Language tag as reported by the plan (`javascript`, `json`, ...)
    pub language: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: ArtifactStatus,
}

impl Artifact {
    /// Skeleton entry seeded from a plan: no content yet.
    pub fn pending(name: &str, language: &str) -> Self {
        Self {
            name: name.to_string(),
            language: language.to_string(),
            content: String::new(),
            status: ArtifactStatus::Pending,
        }
    }

    /// Whether the language tag marks this artifact as data/configuration.
    pub fn is_config(&self) -> bool {
        let tag = self.language.trim().to_lowercase();
        CONFIG_LANGUAGES.contains(&tag.as_str())
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Whether a finding refers to this artifact by name. The name must stand
    /// alone: `myapp.js`, `src/app.js` and `app.jsx` do not mention `app.js`.
    pub fn is_mentioned_by(&self, finding: &Finding) -> bool {
        mentions(&finding.test_name, &self.name) || mentions(&finding.message, &self.name)
    }
}

fn mentions(text: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '-';
    text.match_indices(name).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let mut after = text[start + name.len()..].chars();
        let open_before = !before.is_some_and(|c| is_word(c) || c == '/' || c == '.');
        // Sentence punctuation may follow; another path segment or extension may not.
        let open_after = match after.next() {
            None => true,
            Some('.' | '/') => !after.next().is_some_and(is_word),
            Some(c) => !is_word(c),
        };
        open_before && open_after
    })
}

/// Outcome of a single test or quality check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub test_name: String,
    pub passed: bool,
    #[serde(default)]
    pub message: String,
}

impl Finding {
    pub fn new(test_name: &str, passed: bool, message: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            test_name: test_name.to_string(),
            passed,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    System,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// A conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot recorded once per analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub iteration: u32,
    pub quality_score: u8,
    pub bug_count: usize,
}

/// Result of merging a named artifact into a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An artifact with that name existed; only its content changed.
    Updated,
    /// A new artifact was appended with status `created`.
    Appended,
}

/// The single live project owned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<Artifact>,
    #[serde(default)]
    pub test_results: Vec<Finding>,
    #[serde(default)]
    pub quality_score: u8,
    #[serde(default)]
    pub iteration: u32,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

impl Project {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            ..Self::default()
        }
    }

    pub fn has_artifacts(&self) -> bool {
        !self.files.is_empty()
    }

    /// Number of failing findings from the latest analysis.
    pub fn bug_count(&self) -> usize {
        self.test_results.iter().filter(|r| !r.passed).count()
    }

    pub fn failing_findings(&self) -> impl Iterator<Item = &Finding> {
        self.test_results.iter().filter(|r| !r.passed)
    }

    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn artifact_mut(&mut self, name: &str) -> Option<&mut Artifact> {
        self.files.iter_mut().find(|f| f.name == name)
    }

    /// Merge an artifact by name: overwrite the content of an existing entry,
    /// or append a new one with status `created`. Names stay unique.
    pub fn upsert_artifact(&mut self, name: &str, language: &str, content: &str) -> UpsertOutcome {
        match self.artifact_mut(name) {
            Some(existing) => {
                existing.content = content.to_string();
                if !language.trim().is_empty() {
                    existing.language = language.to_string();
                }
                UpsertOutcome::Updated
            }
            None => {
                self.files.push(Artifact {
                    name: name.to_string(),
                    language: language.to_string(),
                    content: content.to_string(),
                    status: ArtifactStatus::Created,
                });
                UpsertOutcome::Appended
            }
        }
    }

    /// Latest metric snapshot derivable from the project alone.
    pub fn current_metric(&self) -> MetricPoint {
        MetricPoint {
            iteration: self.iteration,
            quality_score: self.quality_score,
            bug_count: self.bug_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(names: &[(&str, &str)]) -> Project {
        let mut project = Project::new("demo", "a demo");
        for (name, lang) in names {
            project.files.push(Artifact::pending(name, lang));
        }
        project
    }

    #[test]
    fn test_upsert_existing_overwrites_content_only() {
        let mut project = project_with(&[("index.html", "html"), ("app.js", "javascript")]);
        project.files[1].status = ArtifactStatus::Verified;

        let outcome = project.upsert_artifact("app.js", "javascript", "console.log(1);");

        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(project.files.len(), 2);
        assert_eq!(project.files[1].content, "console.log(1);");
        assert_eq!(project.files[1].status, ArtifactStatus::Verified);
        assert!(project.files[0].content.is_empty());
    }

    #[test]
    fn test_upsert_new_appends_created() {
        let mut project = project_with(&[("index.html", "html")]);

        let outcome = project.upsert_artifact("style.css", "css", "body {}");

        assert_eq!(outcome, UpsertOutcome::Appended);
        assert_eq!(project.files.len(), 2);
        assert_eq!(project.files[1].name, "style.css");
        assert_eq!(project.files[1].status, ArtifactStatus::Created);
    }

    #[test]
    fn test_upsert_keeps_language_when_blank() {
        let mut project = project_with(&[("app.py", "python")]);
        project.upsert_artifact("app.py", "", "print('hi')");
        assert_eq!(project.files[0].language, "python");
    }

    #[test]
    fn test_is_config() {
        assert!(Artifact::pending("package.json", "json").is_config());
        assert!(Artifact::pending("config.yml", "YAML").is_config());
        assert!(!Artifact::pending("main.rs", "rust").is_config());
        assert!(!Artifact::pending("index.html", "html").is_config());
    }

    #[test]
    fn test_bug_count_and_metric() {
        let mut project = project_with(&[]);
        project.iteration = 2;
        project.quality_score = 70;
        project.test_results = vec![
            Finding::new("renders", true, ""),
            Finding::new("handles empty input", false, "app.js crashes"),
            Finding::new("persists", false, "nothing saved"),
        ];
        assert_eq!(project.bug_count(), 2);
        assert_eq!(
            project.current_metric(),
            MetricPoint {
                iteration: 2,
                quality_score: 70,
                bug_count: 2
            }
        );
    }

    #[test]
    fn test_is_mentioned_by() {
        let artifact = Artifact::pending("app.js", "javascript");
        assert!(artifact.is_mentioned_by(&Finding::new("x", false, "TypeError in app.js line 4")));
        assert!(!artifact.is_mentioned_by(&Finding::new("x", false, "style.css is empty")));
        assert!(artifact.is_mentioned_by(&Finding::new("app.js renders", false, "blank")));
        assert!(artifact.is_mentioned_by(&Finding::new("x", false, "Crash at (app.js:12)")));
        assert!(artifact.is_mentioned_by(&Finding::new("x", false, "Missing export in app.js.")));
    }

    #[test]
    fn test_is_mentioned_by_requires_whole_name() {
        let artifact = Artifact::pending("app.js", "javascript");
        for message in [
            "myapp.js throws on load",
            "src/app.js is unused",
            "app.jsx fails to compile",
            "app.js.map is stale",
        ] {
            assert!(
                !artifact.is_mentioned_by(&Finding::new("x", false, message)),
                "{} should not mention app.js",
                message
            );
        }
        // A later standalone occurrence still counts.
        assert!(artifact.is_mentioned_by(&Finding::new("x", false, "myapp.js imports app.js")));
    }

    #[test]
    fn test_project_deserializes_with_missing_fields() {
        let project: Project = serde_json::from_str(r#"{"name": "old"}"#).unwrap();
        assert_eq!(project.name, "old");
        assert_eq!(project.phase, Phase::Idle);
        assert!(project.files.is_empty());
        assert!(project.report.is_none());
    }
}
