//! One-shot build: `vibeforge build <goal>`.

use anyhow::{Result, bail};
use std::sync::Arc;
use vibeforge::config::Config;
use vibeforge::orchestrator::DispatchStatus;
use vibeforge::ui::BuildUI;
use vibeforge_common::Severity;

use super::open_orchestrator;

/// Start a fresh project for `goal` and run it to completion. Earlier turns
/// of the session's conversation are kept. Ctrl-C stops the build at the next
/// checkpoint.
pub async fn cmd_build(config: &Config, goal: &str) -> Result<()> {
    let mut orchestrator = open_orchestrator(config)?;
    orchestrator.reset_project()?;

    let ui = Arc::new(BuildUI::new(config.verbose));
    let renderer = Arc::clone(&ui).spawn(orchestrator.subscribe());

    let gate = orchestrator.gate();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            gate.stop();
        }
    });

    let outcome = orchestrator.dispatch(goal).await;
    interrupt.abort();

    let project = orchestrator.project().clone();
    // Dropping the orchestrator closes the event channel and ends the renderer.
    drop(orchestrator);
    let _ = renderer.await;

    match outcome?.status {
        DispatchStatus::Succeeded => {
            println!(
                "Run `vibeforge export <dir>` to write {} file(s) to disk.",
                project.files.len()
            );
            Ok(())
        }
        DispatchStatus::Stopped => Ok(()),
        DispatchStatus::Failed => {
            let reason = project
                .logs
                .iter()
                .rev()
                .find(|e| e.severity == Severity::Error)
                .map(|e| e.message.clone())
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("Build failed: {}", reason)
        }
    }
}
