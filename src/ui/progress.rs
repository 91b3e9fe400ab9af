use crate::orchestrator::SessionEvent;
use crate::ui::icons::{
    AGENT, BUG, CHECK, CODE, CROSS, FILE_MOD, FILE_NEW, FOLDER, PLAN, PROGRESS, REFINE, SPARKLE,
    STOP, TEST, WARN,
};
use console::{Emoji, style};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use vibeforge_common::{Artifact, ArtifactStatus, LogEntry, MetricPoint, Phase, Project, Severity};

/// Terminal view of one session, driven entirely by [`SessionEvent`]s.
///
/// Two bars are stacked vertically:
/// - Phase bar: spinner with the current phase and the latest step
/// - Quality bar: latest metric point and artifact tally
pub struct BuildUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    quality_bar: ProgressBar,
    verbose: bool,
}

impl BuildUI {
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let phase_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");
        let phase_bar = multi.add(ProgressBar::new_spinner());
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("  Phase");

        let quality_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} {msg}")
            .expect("progress bar template is a valid static string");
        let quality_bar = multi.add(ProgressBar::new(0));
        quality_bar.set_style(quality_style);
        quality_bar.set_prefix("Quality");

        Self {
            multi,
            phase_bar,
            quality_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    pub fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn notice(&self, msg: &str) {
        self.print_line(format!("  {}", style(msg).dim()));
    }

    pub fn handle(&self, event: &SessionEvent) {
        match event {
            SessionEvent::PhaseChanged { from, to } => self.on_phase(*from, *to),
            SessionEvent::Log { entry } => self.on_log(entry),
            SessionEvent::ArtifactsUpdated { files } => self.on_artifacts(files),
            SessionEvent::MetricRecorded { point } => self.on_metric(point),
            SessionEvent::AgentMessage { message } => self.show_agent_message(&message.text),
        }
    }

    fn on_phase(&self, from: Phase, to: Phase) {
        self.phase_bar
            .set_message(format!("{}{}", phase_icon(to), style(to).yellow()));
        if to.is_busy() && !from.is_busy() {
            self.phase_bar.enable_steady_tick(Duration::from_millis(100));
        }
        match to {
            Phase::Completed => {
                self.phase_bar.disable_steady_tick();
                self.print_line(format!(
                    "\n{} {}\n",
                    SPARKLE,
                    style("Build completed").green().bold()
                ));
            }
            Phase::Failed => {
                self.phase_bar.disable_steady_tick();
                self.print_line(format!("\n{} {}\n", CROSS, style("Build failed").red().bold()));
            }
            Phase::Stopped | Phase::Idle => self.phase_bar.disable_steady_tick(),
            _ => {
                if self.verbose {
                    self.print_line(format!(
                        "  {} {} → {}",
                        style("phase").dim(),
                        from,
                        style(to).cyan()
                    ));
                }
            }
        }
    }

    fn on_log(&self, entry: &LogEntry) {
        match entry.severity {
            Severity::Info => {
                self.phase_bar
                    .set_message(format!("{}", style(&entry.message).dim()));
                if self.verbose {
                    self.print_line(format!(
                        "    {} {}",
                        style("→").dim(),
                        style(&entry.message).dim()
                    ));
                }
            }
            Severity::Success => {
                self.print_line(format!("  {}{}", CHECK, style(&entry.message).green()))
            }
            Severity::Warning => {
                let icon = if entry.message.contains("stopped") { STOP } else { WARN };
                self.print_line(format!("  {}{}", icon, style(&entry.message).yellow()))
            }
            Severity::Error => {
                self.print_line(format!("  {}{}", CROSS, style(&entry.message).red().bold()))
            }
            Severity::System => {
                self.print_line(format!("  {}", style(&entry.message).cyan().bold()))
            }
        }
    }

    fn on_artifacts(&self, files: &[Artifact]) {
        let written = files.iter().filter(|f| f.status != ArtifactStatus::Pending).count();
        let buggy = files.iter().filter(|f| f.status == ArtifactStatus::Buggy).count();
        self.quality_bar.set_length(files.len() as u64);
        self.quality_bar.set_position(written as u64);
        self.quality_bar.set_message(format!(
            "{}{}/{} written {}",
            FOLDER,
            style(written).green(),
            files.len(),
            if buggy > 0 {
                format!("{}{}", BUG, style(buggy).red())
            } else {
                String::new()
            }
        ));
        if self.verbose {
            for file in files {
                let icon = match file.status {
                    ArtifactStatus::Pending => continue,
                    ArtifactStatus::Created => FILE_NEW,
                    ArtifactStatus::Verified => FILE_MOD,
                    ArtifactStatus::Buggy => BUG,
                };
                self.print_line(format!(
                    "    {}{} {}",
                    icon,
                    file.name,
                    style(file.status.as_str()).dim()
                ));
            }
        }
    }

    fn on_metric(&self, point: &MetricPoint) {
        let score = if point.quality_score >= 95 {
            style(point.quality_score).green().bold()
        } else if point.quality_score >= 70 {
            style(point.quality_score).yellow()
        } else {
            style(point.quality_score).red()
        };
        self.print_line(format!(
            "  {}Iteration {}: quality {}/100, {} failing check(s)",
            PROGRESS,
            style(point.iteration).cyan(),
            score,
            point.bug_count
        ));
    }

    pub fn show_agent_message(&self, text: &str) {
        let options = textwrap::Options::new(100)
            .initial_indent("  ")
            .subsequent_indent("  ");
        self.print_line(format!(
            "\n{}{}\n{}\n",
            AGENT,
            style("vibeforge").bold(),
            textwrap::fill(text, options)
        ));
    }

    pub fn finish(&self) {
        self.phase_bar.finish_and_clear();
        self.quality_bar.finish_and_clear();
    }

    /// Render events until the orchestrator's sender is dropped.
    pub fn spawn(self: Arc<Self>, mut rx: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.handle(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "renderer lagged behind session events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            self.finish();
        })
    }
}

fn phase_icon(phase: Phase) -> Emoji<'static, 'static> {
    match phase {
        Phase::Planning => PLAN,
        Phase::Coding => CODE,
        Phase::Testing => TEST,
        Phase::Refining => REFINE,
        Phase::Completed => CHECK,
        Phase::Failed => CROSS,
        Phase::Stopped => STOP,
        Phase::Idle => Emoji("", ""),
    }
}

/// Plain-text session summary for `vibeforge status` and `/status`.
pub fn status_lines(project: &Project, metrics: &[MetricPoint], messages: usize) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Project:   {}",
            if project.name.is_empty() { "(none)" } else { &project.name }
        ),
        format!("Phase:     {}", project.phase),
        format!("Iteration: {}", project.iteration),
        format!("Quality:   {}/100", project.quality_score),
        format!("Bugs:      {}", project.bug_count()),
        format!("Messages:  {}", messages),
    ];
    if !project.description.is_empty() {
        lines.insert(1, format!("Goal:      {}", project.description));
    }

    if !project.files.is_empty() {
        lines.push(format!("Files ({}):", project.files.len()));
        for file in &project.files {
            lines.push(format!(
                "  {:<9} {} ({})",
                file.status.as_str(),
                file.name,
                file.language
            ));
        }
    }

    if metrics.len() > 1 {
        let trend = metrics
            .iter()
            .map(|m| m.quality_score.to_string())
            .collect::<Vec<_>>()
            .join(" → ");
        lines.push(format!("Trend:     {}", trend));
    }
    lines
}
