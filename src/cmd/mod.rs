//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled              |
//! |-----------|-------------------------------|
//! | `project` | `Init`                        |
//! | `chat`    | `Chat`                        |
//! | `build`   | `Build`                       |
//! | `session` | `Status`, `Export`, `Reset`   |
//! | `config`  | `Config`                      |

pub mod build;
pub mod chat;
pub mod config;
pub mod project;
pub mod session;

pub use build::cmd_build;
pub use chat::cmd_chat;
pub use config::cmd_config;
pub use project::cmd_init;
pub use session::{cmd_export, cmd_reset, cmd_status};

use anyhow::Result;
use std::sync::Arc;
use vibeforge::collaborator::HttpCollaborator;
use vibeforge::config::Config;
use vibeforge::orchestrator::Orchestrator;
use vibeforge::store::SqliteSessionStore;

/// Restore the configured session against the HTTP collaborator.
pub fn open_orchestrator(config: &Config) -> Result<Orchestrator> {
    let collaborator = HttpCollaborator::new(config.collaborator_settings()?)?;
    config.ensure_directories()?;
    let store = SqliteSessionStore::open(&config.db_path)?;

    tracing::info!(
        session = %config.session,
        model = %config.model(),
        "opening session"
    );
    Ok(Orchestrator::restore(
        &config.session,
        Arc::new(collaborator),
        Arc::new(store),
        config.build_settings(),
    ))
}
