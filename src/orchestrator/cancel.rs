use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::errors::OrchestratorError;

/// Cooperative stop flag shared between the orchestrator and whoever can ask
/// it to stop (the chat loop, a Ctrl-C handler).
///
/// The orchestrator calls [`checkpoint`](Self::checkpoint) before and after
/// every collaborator call and between per-artifact steps. A stop is never
/// observed mid-mutation. A stop set before an operation reaches its first
/// checkpoint cancels that operation. Whoever hands the orchestrator a new
/// operation calls [`reset`](Self::reset) at that moment, which swaps in a
/// fresh token so a stop aimed at the previous run cannot leak into the next
/// one. The orchestrator also resets the gate once it has observed a stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationGate {
    token: Arc<Mutex<CancellationToken>>,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn stop(&self) {
        self.current().cancel();
    }

    pub fn reset(&self) {
        let mut token = self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *token = CancellationToken::new();
    }

    pub fn is_stopped(&self) -> bool {
        self.current().is_cancelled()
    }

    pub fn checkpoint(&self) -> Result<(), OrchestratorError> {
        if self.is_stopped() {
            Err(OrchestratorError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_and_reset() {
        let gate = CancellationGate::new();
        assert!(gate.checkpoint().is_ok());

        gate.stop();
        assert!(gate.is_stopped());
        assert!(gate.checkpoint().unwrap_err().is_cancelled());

        gate.reset();
        assert!(!gate.is_stopped());
        assert!(gate.checkpoint().is_ok());
    }

    #[test]
    fn test_clones_share_state() {
        let gate = CancellationGate::new();
        let remote = gate.clone();
        remote.stop();
        assert!(gate.is_stopped());

        gate.reset();
        assert!(!remote.is_stopped());
    }

    #[test]
    fn test_stop_after_reset_reaches_new_run() {
        let gate = CancellationGate::new();
        let remote = gate.clone();
        remote.stop();
        gate.reset();
        assert!(!remote.is_stopped());

        remote.stop();
        assert!(gate.checkpoint().unwrap_err().is_cancelled());
    }
}
