use serde::{Deserialize, Serialize};

/// Lifecycle phase of a build.
///
/// | Phase       | Busy | Terminal | Meaning                                   |
/// |-------------|------|----------|-------------------------------------------|
/// | `Idle`      |      |          | No build has started for this project     |
/// | `Planning`  | yes  |          | Waiting for the plan                      |
/// | `Coding`    | yes  |          | Generating artifacts in plan order        |
/// | `Testing`   | yes  |          | Analysis pass in flight                   |
/// | `Refining`  | yes  |          | Refactor or refinement in flight          |
/// | `Completed` |      | yes      | Report written (or budget exhausted)      |
/// | `Failed`    |      | yes      | Unrecoverable collaborator error          |
/// | `Stopped`   |      | yes      | User cancelled the operation              |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Planning,
    Coding,
    Testing,
    Refining,
    Completed,
    Failed,
    Stopped,
}

impl Phase {
    /// Phases during which an operation is normally in flight. Manual test
    /// runs and new input are gated on this.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            Phase::Planning | Phase::Coding | Phase::Testing | Phase::Refining
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Planning => "planning",
            Phase::Coding => "coding",
            Phase::Testing => "testing",
            Phase::Refining => "refining",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
            Phase::Stopped => "stopped",
        }
    }

    pub fn all() -> [Phase; 8] {
        [
            Phase::Idle,
            Phase::Planning,
            Phase::Coding,
            Phase::Testing,
            Phase::Refining,
            Phase::Completed,
            Phase::Failed,
            Phase::Stopped,
        ]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::all()
            .into_iter()
            .find(|p| p.as_str() == s.to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Invalid phase '{}'", s))
    }
}
