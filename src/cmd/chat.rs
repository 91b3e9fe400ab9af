//! Interactive session: `vibeforge chat`.
//!
//! The orchestrator runs on a worker task that takes one job at a time. The
//! input loop stays responsive while a job runs so `/stop` and Ctrl-C can
//! reach the cancellation gate; anything else typed while busy is refused
//! without touching the conversation.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use vibeforge::config::Config;
use vibeforge::errors::OrchestratorError;
use vibeforge::orchestrator::{CancellationGate, Orchestrator};
use vibeforge::ui::{BuildUI, status_lines};

use super::open_orchestrator;

const BUSY_NOTICE: &str = "Still working. Wait for the current run to finish, or /stop it.";

/// Work handed to the orchestrator task.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Job {
    Message(String),
    Test,
    New,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChatInput {
    Empty,
    Help,
    Quit,
    Stop,
    Job(Job),
    Unknown(String),
}

impl ChatInput {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Job(Job::Message(line.to_string()));
        }
        let command = line.split_whitespace().next().unwrap_or(line);
        match command.to_lowercase().as_str() {
            "/help" | "/?" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            "/stop" => Self::Stop,
            "/test" => Self::Job(Job::Test),
            "/new" => Self::Job(Job::New),
            "/status" => Self::Job(Job::Status),
            _ => Self::Unknown(command.to_string()),
        }
    }
}

fn print_help(ui: &BuildUI) {
    for line in [
        "Type what you want built. Once a project exists, messages refine it.",
        "  /test    run an analysis pass over the current files",
        "  /stop    stop the current run (Ctrl-C does the same)",
        "  /new     discard the project and start over",
        "  /status  show the session summary",
        "  /quit    leave",
    ] {
        ui.print_line(line);
    }
}

fn rejection_notice(err: &OrchestratorError) -> Option<String> {
    match err {
        OrchestratorError::EmptyMessage => None,
        OrchestratorError::Rejected { phase } => Some(format!(
            "The project is stuck in {}. Use /new to start over.",
            phase
        )),
        other => Some(other.to_string()),
    }
}

/// Take the worker for a new job. A stale stop is cleared on the way in; a
/// stop issued after this point belongs to the job.
fn claim(busy: &AtomicBool, gate: &CancellationGate) -> bool {
    if busy.swap(true, Ordering::SeqCst) {
        return false;
    }
    gate.reset();
    true
}

async fn run_worker(
    mut orchestrator: Orchestrator,
    mut jobs: mpsc::Receiver<Job>,
    busy: Arc<AtomicBool>,
    ui: Arc<BuildUI>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Message(text) => {
                if let Err(e) = orchestrator.dispatch(&text).await
                    && let Some(notice) = rejection_notice(&e)
                {
                    ui.notice(&notice);
                }
            }
            Job::Test => match orchestrator.run_manual_test().await {
                Ok(summary) => ui.notice(&format!(
                    "Test pass {}: quality {}/100, {} failing check(s){}",
                    summary.iteration,
                    summary.quality_score,
                    summary.bug_count,
                    if summary.degraded { ", vibe degraded" } else { "" }
                )),
                Err(OrchestratorError::Cancelled) => ui.notice("Test run stopped."),
                Err(e) => ui.notice(&e.to_string()),
            },
            Job::New => {
                orchestrator.new_project();
                ui.notice("Started a new project. Describe what to build.");
            }
            Job::Status => {
                let lines = status_lines(
                    orchestrator.project(),
                    orchestrator.metrics(),
                    orchestrator.conversation().len(),
                );
                for line in lines {
                    ui.print_line(line);
                }
            }
        }
        busy.store(false, Ordering::SeqCst);
    }
}

pub async fn cmd_chat(config: &Config) -> Result<()> {
    let orchestrator = open_orchestrator(config)?;
    let ui = Arc::new(BuildUI::new(config.verbose));
    let renderer = Arc::clone(&ui).spawn(orchestrator.subscribe());
    let gate = orchestrator.gate();

    ui.print_line(format!(
        "{} session '{}' ({}). Type /help for commands.",
        console::style("vibeforge").bold(),
        config.session,
        orchestrator.phase()
    ));
    if orchestrator.project().has_artifacts() {
        ui.notice(&format!(
            "Resuming {} with {} file(s) at quality {}/100.",
            orchestrator.project().name,
            orchestrator.project().files.len(),
            orchestrator.project().quality_score
        ));
    }

    let busy = Arc::new(AtomicBool::new(false));
    let (jobs, rx) = mpsc::channel::<Job>(4);
    let worker = tokio::spawn(run_worker(
        orchestrator,
        rx,
        Arc::clone(&busy),
        Arc::clone(&ui),
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                if busy.load(Ordering::SeqCst) {
                    gate.stop();
                    ui.notice("Stopping after the current step...");
                    continue;
                }
                break;
            }
        };
        let Some(line) = line else { break };

        match ChatInput::parse(&line) {
            ChatInput::Empty => {}
            ChatInput::Help => print_help(&ui),
            ChatInput::Quit => {
                if busy.load(Ordering::SeqCst) {
                    gate.stop();
                }
                break;
            }
            ChatInput::Stop => {
                if busy.load(Ordering::SeqCst) {
                    gate.stop();
                    ui.notice("Stopping after the current step...");
                } else {
                    ui.notice("Nothing is running.");
                }
            }
            ChatInput::Unknown(command) => {
                ui.notice(&format!("Unknown command {}. Type /help.", command));
            }
            ChatInput::Job(job) => {
                if !claim(&busy, &gate) {
                    ui.notice(BUSY_NOTICE);
                    continue;
                }
                if jobs.send(job).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(jobs);
    worker.await.context("Chat worker panicked")?;
    let _ = renderer.await;
    Ok(())
}
