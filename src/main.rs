use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vibeforge::config::Config;

mod cmd;

#[derive(Parser)]
#[command(name = "vibeforge")]
#[command(
    version,
    about = "Iterative build orchestrator: plan, generate, test and refine a project through a chat"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Session id to use. Overrides [project] session in vibeforge.toml.
    #[arg(long, global = true, env = "VIBEFORGE_SESSION")]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new vibeforge project
    Init,
    /// Chat with the orchestrator: describe a project, then refine it
    Chat,
    /// Build a fresh project from a goal and exit
    Build {
        /// What to build
        goal: String,
    },
    /// Show the current session
    Status,
    /// Write the session's files to a directory
    Export {
        /// Target directory (relative paths resolve against the project dir)
        dir: PathBuf,
    },
    /// Discard the session's project and conversation
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default vibeforge.toml file
    Init,
}

/// Diagnostics go to `.vibeforge/logs/vibeforge.log` once the project is
/// initialized, keeping the terminal for the session view. Before that only
/// warnings reach stderr. `VIBEFORGE_LOG` overrides the filter.
fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if config.log_dir.exists() {
        let default = if config.verbose {
            "vibeforge=debug"
        } else {
            "vibeforge=info"
        };
        let filter =
            EnvFilter::try_from_env("VIBEFORGE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
        let appender = tracing_appender::rolling::never(&config.log_dir, "vibeforge.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        let filter = EnvFilter::try_from_env("VIBEFORGE_LOG")
            .unwrap_or_else(|_| EnvFilter::new("vibeforge=warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        None
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = Config::new(project_dir, cli.verbose, cli.session.clone())?;
    let _log_guard = init_tracing(&config);

    match &cli.command {
        Commands::Init => cmd::cmd_init(&config)?,
        Commands::Chat => cmd::cmd_chat(&config).await?,
        Commands::Build { goal } => cmd::cmd_build(&config, goal).await?,
        Commands::Status => cmd::cmd_status(&config)?,
        Commands::Export { dir } => cmd::cmd_export(&config, dir)?,
        Commands::Reset { force } => cmd::cmd_reset(&config, *force)?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
