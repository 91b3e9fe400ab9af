//! Configuration view and validation commands: `vibeforge config`.

use anyhow::Result;
use vibeforge::config::{Config, VibeToml};

use super::super::ConfigCommands;

fn print_toml(toml: &VibeToml) {
    println!("[project]");
    println!("  session = \"{}\"", toml.project.session);
    println!();
    println!("[collaborator]");
    println!("  base_url = \"{}\"", toml.collaborator.base_url);
    println!("  model = \"{}\"", toml.collaborator.model);
    println!("  api_key_env = \"{}\"", toml.collaborator.api_key_env);
    println!("  max_tokens = {}", toml.collaborator.max_tokens);
    println!("  timeout_secs = {}", toml.collaborator.timeout_secs);
    println!();
    println!("[build]");
    println!("  max_iterations = {}", toml.build.max_iterations);
    println!("  quality_target = {}", toml.build.quality_target);
    println!("  max_refactor_targets = {}", toml.build.max_refactor_targets);
    println!("  pacing_ms = {}", toml.build.pacing_ms);
    println!();
}

pub fn cmd_config(config: &Config, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_path();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("vibeforge Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No vibeforge.toml found at {}", config_path.display());
                println!("Using default configuration:");
            }
            println!();
            print_toml(&config.toml);

            println!("Effective values (with env/CLI overrides):");
            println!("  session = \"{}\"", config.session);
            println!("  base_url = \"{}\"", config.base_url());
            println!("  model = \"{}\"", config.model());
            println!("  timeout_secs = {}", config.call_timeout().as_secs());
            println!(
                "  api_key = {}",
                if config.api_key().is_some() {
                    "set"
                } else {
                    "missing"
                }
            );
            println!();
            if !config_path.exists() {
                println!("Run 'vibeforge config init' to create a vibeforge.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No vibeforge.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.toml.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("vibeforge.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            config.ensure_directories()?;
            VibeToml::default().save(&config_path)?;

            println!("Created vibeforge.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [collaborator] base_url, model, api_key_env, timeout_secs");
            println!("  - [build] max_iterations, quality_target, max_refactor_targets");
            println!();
        }
    }

    Ok(())
}
