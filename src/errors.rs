//! Typed error hierarchy for the vibeforge orchestrator.
//!
//! Two top-level enums cover the two layers:
//! - `CollaboratorError`: a single call to the generative code service failed
//! - `OrchestratorError`: a build, refinement or manual test did not finish

use thiserror::Error;
use vibeforge_common::Phase;

/// Errors from one round trip to the generative collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{operation} call failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} call timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("{operation} returned an invalid response: {message}")]
    Validation {
        operation: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn service(operation: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Service {
            operation,
            message: message.to_string(),
        }
    }

    pub fn validation(operation: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Validation {
            operation,
            message: message.to_string(),
        }
    }

    /// The response arrived but was malformed. Propagates like any other
    /// service failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Service { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Validation { operation, .. } => operation,
        }
    }
}

/// Errors from an orchestrator operation.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The user stopped the operation. Not a failure.
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Event '{event}' is not valid in phase {phase}")]
    InvalidTransition { phase: Phase, event: String },

    #[error("Input rejected while {phase}")]
    Rejected { phase: Phase },

    #[error("No artifacts to test")]
    NothingToTest,

    #[error("Message is empty")]
    EmptyMessage,
}

impl OrchestratorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_error_service_carries_operation() {
        let err = CollaboratorError::service("plan", "connection refused");
        assert_eq!(err.operation(), "plan");
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.is_validation());
    }

    #[test]
    fn collaborator_error_validation_is_flagged() {
        let err = CollaboratorError::validation("refine", "missing name");
        assert!(err.is_validation());
        assert!(err.to_string().contains("invalid response"));
    }

    #[test]
    fn timeout_mentions_seconds() {
        let err = CollaboratorError::Timeout {
            operation: "analyze",
            seconds: 30,
        };
        assert!(err.to_string().contains("30s"));
        assert_eq!(err.operation(), "analyze");
    }

    #[test]
    fn orchestrator_error_converts_from_collaborator_error() {
        let err: OrchestratorError = CollaboratorError::service("report", "boom").into();
        match &err {
            OrchestratorError::Collaborator(inner) => assert_eq!(inner.operation(), "report"),
            _ => panic!("Expected OrchestratorError::Collaborator"),
        }
        assert!(!err.is_cancelled());
    }

    #[test]
    fn invalid_transition_names_phase_and_event() {
        let err = OrchestratorError::InvalidTransition {
            phase: Phase::Idle,
            event: "fixes applied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("idle"));
        assert!(msg.contains("fixes applied"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&CollaboratorError::service("plan", "x"));
        assert_std_error(&OrchestratorError::Cancelled);
    }
}
