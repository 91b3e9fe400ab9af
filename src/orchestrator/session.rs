use serde::{Deserialize, Serialize};
use vibeforge_common::{Artifact, LogEntry, Message, MetricPoint, Phase};

use super::state::BuildState;

/// Everything one orchestrator owns: the build state and the conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub state: BuildState,
    pub conversation: Vec<Message>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: BuildState::default(),
            conversation: Vec::new(),
        }
    }
}

// ── Observer events ──────────────────────────────────────────────────

/// Published on every observable change so presentation layers can follow a
/// build without polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    PhaseChanged { from: Phase, to: Phase },
    Log { entry: LogEntry },
    ArtifactsUpdated { files: Vec<Artifact> },
    MetricRecorded { point: MetricPoint },
    AgentMessage { message: Message },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let session = Session::new("default");
        assert_eq!(session.id, "default");
        assert_eq!(session.state.phase(), Phase::Idle);
        assert!(session.conversation.is_empty());
        assert!(session.state.metrics().is_empty());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = SessionEvent::PhaseChanged {
            from: Phase::Planning,
            to: Phase::Coding,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PhaseChanged");
        assert_eq!(json["data"]["to"], "coding");
    }
}
