//! Project initialization: `vibeforge init`.

use anyhow::Result;
use vibeforge::config::{Config, VibeToml};

pub fn cmd_init(config: &Config) -> Result<()> {
    let was_initialized = config.is_initialized();
    config.ensure_directories()?;

    let config_path = config.config_path();
    let wrote_config = if config_path.exists() {
        false
    } else {
        VibeToml::default().save(&config_path)?;
        true
    };

    if was_initialized {
        println!(
            "vibeforge project already initialized at {}",
            config.vibe_dir.display()
        );
        if wrote_config {
            println!("Restored missing vibeforge.toml.");
        } else {
            println!("Directory structure verified.");
        }
        return Ok(());
    }

    println!(
        "Initialized vibeforge project at {}",
        config.vibe_dir.display()
    );
    println!();
    println!("Created directory structure:");
    println!("  .vibeforge/");
    println!("  ├── vibeforge.toml  # Collaborator and build settings");
    println!("  ├── session.db      # Project and conversation (created on first run)");
    println!("  └── logs/           # Diagnostic logs");
    println!();
    println!("Next steps:");
    println!(
        "  1. Set {} (or add it to .env)",
        config.toml.collaborator.api_key_env
    );
    println!("  2. Run `vibeforge chat` and describe what to build");
    println!("  3. Run `vibeforge export <dir>` to write the files to disk");
    Ok(())
}
