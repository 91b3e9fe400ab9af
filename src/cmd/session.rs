//! Session inspection and maintenance: status, export and reset.

use anyhow::Result;
use std::path::Path;
use vibeforge::config::Config;
use vibeforge::export::export_artifacts;
use vibeforge::orchestrator::BuildState;
use vibeforge::store::{SessionStore, SqliteSessionStore};
use vibeforge::ui::status_lines;

/// Open the session store only if it already exists.
fn existing_store(config: &Config) -> Result<Option<SqliteSessionStore>> {
    if !config.db_path.exists() {
        return Ok(None);
    }
    Ok(Some(SqliteSessionStore::open(&config.db_path)?))
}

pub fn cmd_status(config: &Config) -> Result<()> {
    if !config.is_initialized() {
        println!();
        println!("Project not initialized. Run 'vibeforge init' first.");
        println!();
        return Ok(());
    }

    let store = existing_store(config)?;
    let sessions = match &store {
        Some(store) => store.sessions()?,
        None => Vec::new(),
    };
    let project = match store {
        Some(store) => store.load_project(&config.session)?.map(|p| (p, store)),
        None => None,
    };
    let Some((project, store)) = project else {
        println!();
        println!("No session '{}' yet.", config.session);
        println!("Start one with `vibeforge chat` or `vibeforge build <goal>`.");
        if !sessions.is_empty() {
            println!("Stored sessions: {}", sessions.join(", "));
        }
        println!();
        return Ok(());
    };

    let messages = store
        .load_conversation(&config.session)?
        .map(|c| c.len())
        .unwrap_or(0);
    let state = BuildState::new(project);

    println!();
    println!("Session: {}", config.session);
    for line in status_lines(state.project(), state.metrics(), messages) {
        println!("{}", line);
    }
    if sessions.len() > 1 {
        println!("Stored sessions: {}", sessions.join(", "));
    }
    if let Some(entry) = state.project().logs.last() {
        println!();
        println!(
            "Last log ({} {}): {}",
            entry
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S"),
            console::style(entry.severity.as_str()).dim(),
            entry.message
        );
    }
    println!();
    Ok(())
}

pub fn cmd_export(config: &Config, dir: &Path) -> Result<()> {
    let project = match existing_store(config)? {
        Some(store) => store.load_project(&config.session)?,
        None => None,
    };
    let Some(project) = project.filter(|p| p.has_artifacts()) else {
        println!("Nothing to export: session '{}' has no files.", config.session);
        return Ok(());
    };

    let target = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        config.project_dir.join(dir)
    };
    let written = export_artifacts(&project, &target)?;

    println!(
        "Exported {} file(s) from '{}' to {}",
        written.len(),
        project.name,
        target.display()
    );
    for path in &written {
        if let Ok(relative) = path.strip_prefix(&target) {
            println!("  {}", relative.display());
        }
    }
    let skipped = project.files.len() - written.len();
    if skipped > 0 {
        println!("Skipped {} file(s) without content.", skipped);
    }
    Ok(())
}

pub fn cmd_reset(config: &Config, force: bool) -> Result<()> {
    use dialoguer::Confirm;

    if !force {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "This will discard the project and conversation of session '{}'. Are you sure?",
                config.session
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    if let Some(store) = existing_store(config)? {
        store.clear(&config.session)?;
    }
    tracing::info!(session = %config.session, "session cleared");
    println!("Session '{}' cleared", config.session);
    Ok(())
}
