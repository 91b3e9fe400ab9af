//! Configuration for vibeforge.
//!
//! Settings are layered file → environment → CLI. The file lives at
//! `.vibeforge/vibeforge.toml`; every field has a default so a missing or
//! partial file is valid.
//!
//! ```toml
//! [project]
//! session = "default"
//!
//! [collaborator]
//! base_url = "https://api.anthropic.com"
//! model = "claude-sonnet-4-20250514"
//! api_key_env = "VIBEFORGE_API_KEY"
//! max_tokens = 8192
//! timeout_secs = 180
//!
//! [build]
//! max_iterations = 3
//! quality_target = 95
//! max_refactor_targets = 3
//! pacing_ms = 0
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collaborator::HttpCollaboratorConfig;
use crate::orchestrator::BuildSettings;

pub const VIBE_DIR: &str = ".vibeforge";
pub const CONFIG_FILE: &str = "vibeforge.toml";
pub const SESSION_DB: &str = "session.db";

/// Project-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Session id used as the key in the session store
    #[serde(default = "default_session")]
    pub session: String,
}

fn default_session() -> String {
    "default".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            session: default_session(),
        }
    }
}

/// Generative collaborator endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Outer timeout applied to every collaborator call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_api_key_env() -> String {
    "VIBEFORGE_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_timeout_secs() -> u64 {
    180
}

impl Default for CollaboratorSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Iteration budget and convergence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_quality_target")]
    pub quality_target: u8,
    #[serde(default = "default_max_refactor_targets")]
    pub max_refactor_targets: usize,
    /// Delay between generated artifacts, purely cosmetic
    #[serde(default)]
    pub pacing_ms: u64,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_quality_target() -> u8 {
    95
}

fn default_max_refactor_targets() -> usize {
    3
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            quality_target: default_quality_target(),
            max_refactor_targets: default_max_refactor_targets(),
            pacing_ms: 0,
        }
    }
}

/// The complete vibeforge.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VibeToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub collaborator: CollaboratorSection,
    #[serde(default)]
    pub build: BuildSection,
}

impl VibeToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse vibeforge.toml")
    }

    /// Load from `<vibe_dir>/vibeforge.toml`, or defaults when absent.
    pub fn load_or_default(vibe_dir: &Path) -> Result<Self> {
        let path = vibe_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize vibeforge.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.build.quality_target == 0 || self.build.quality_target > 100 {
            warnings.push(format!(
                "Invalid quality_target {}: must be between 1 and 100",
                self.build.quality_target
            ));
        }
        if self.build.max_iterations == 0 {
            warnings.push("max_iterations is 0: builds will never analyze their output".into());
        }
        if self.build.max_refactor_targets == 0 {
            warnings.push("max_refactor_targets is 0: refine passes will change nothing".into());
        }
        if self.collaborator.timeout_secs == 0 {
            warnings.push("timeout_secs is 0: every collaborator call will time out".into());
        }
        if self.collaborator.model.trim().is_empty() {
            warnings.push("collaborator.model is empty".into());
        }
        if self.project.session.trim().is_empty() {
            warnings.push("project.session is empty".into());
        }

        warnings
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Runtime configuration: resolved paths plus the layered settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub vibe_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub session: String,
    pub verbose: bool,
    pub toml: VibeToml,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool, session: Option<String>) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let vibe_dir = project_dir.join(VIBE_DIR);
        let toml = VibeToml::load_or_default(&vibe_dir)?;

        let session = session.unwrap_or_else(|| toml.project.session.clone());

        Ok(Self {
            db_path: vibe_dir.join(SESSION_DB),
            log_dir: vibe_dir.join("logs"),
            project_dir,
            vibe_dir,
            session,
            verbose,
            toml,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.vibe_dir.join(CONFIG_FILE)
    }

    pub fn is_initialized(&self) -> bool {
        self.vibe_dir.exists()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.vibe_dir).context("Failed to create .vibeforge directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    /// Collaborator base URL (env → file).
    pub fn base_url(&self) -> String {
        env_override("VIBEFORGE_BASE_URL")
            .unwrap_or_else(|| self.toml.collaborator.base_url.clone())
    }

    /// Collaborator model (env → file).
    pub fn model(&self) -> String {
        env_override("VIBEFORGE_MODEL").unwrap_or_else(|| self.toml.collaborator.model.clone())
    }

    /// Per-call timeout (env → file).
    pub fn call_timeout(&self) -> Duration {
        let secs = env_override("VIBEFORGE_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.toml.collaborator.timeout_secs);
        Duration::from_secs(secs)
    }

    pub fn api_key(&self) -> Option<String> {
        env_override(&self.toml.collaborator.api_key_env)
    }

    pub fn build_settings(&self) -> BuildSettings {
        BuildSettings {
            max_iterations: self.toml.build.max_iterations,
            quality_target: self.toml.build.quality_target,
            max_refactor_targets: self.toml.build.max_refactor_targets,
            call_timeout: self.call_timeout(),
            pacing: Duration::from_millis(self.toml.build.pacing_ms),
        }
    }

    /// Settings for the HTTP collaborator. Fails when no API key is set.
    pub fn collaborator_settings(&self) -> Result<HttpCollaboratorConfig> {
        let api_key = self.api_key().with_context(|| {
            format!(
                "No API key found. Set {} (or add it to .env)",
                self.toml.collaborator.api_key_env
            )
        })?;
        Ok(HttpCollaboratorConfig {
            base_url: self.base_url(),
            model: self.model(),
            api_key,
            max_tokens: self.toml.collaborator.max_tokens,
            timeout: self.call_timeout(),
        })
    }
}
