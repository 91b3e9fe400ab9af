//! Integration tests for the vibeforge CLI
//!
//! These tests drive the binary end to end on temporary project directories.
//! Nothing here talks to a real collaborator.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use vibeforge::store::{SessionStore, SqliteSessionStore};
use vibeforge_common::{Artifact, ArtifactStatus, Message, Phase, Project};

/// Helper to create a vibeforge Command with no ambient credentials
fn vibeforge() -> Command {
    let mut cmd = cargo_bin_cmd!("vibeforge");
    cmd.env_remove("VIBEFORGE_API_KEY")
        .env_remove("VIBEFORGE_SESSION")
        .env_remove("VIBEFORGE_LOG");
    cmd
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a vibeforge project in a temp directory
fn init_project(dir: &TempDir) {
    vibeforge()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

/// Seed a finished session directly through the store
fn seed_session(dir: &TempDir, session: &str) {
    let store = SqliteSessionStore::open(&dir.path().join(".vibeforge/session.db")).unwrap();

    let mut project = Project::new("todo-app", "a todo app");
    project.phase = Phase::Completed;
    project.iteration = 2;
    project.quality_score = 96;
    for (name, lang, content) in [
        ("index.html", "html", "<ul id=\"todos\"></ul>"),
        ("js/app.js", "javascript", "const todos = [];"),
        ("notes.md", "markdown", ""),
    ] {
        let mut artifact = Artifact::pending(name, lang);
        artifact.content = content.to_string();
        artifact.status = if content.is_empty() {
            ArtifactStatus::Pending
        } else {
            ArtifactStatus::Verified
        };
        project.files.push(artifact);
    }

    store.save_project(session, &project).unwrap();
    store
        .save_conversation(
            session,
            &[Message::user("a todo app"), Message::agent("Built todo-app")],
        )
        .unwrap();
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        vibeforge()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("chat"))
            .stdout(predicate::str::contains("build"));
    }

    #[test]
    fn test_version() {
        vibeforge().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        vibeforge()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized vibeforge project"));

        assert!(dir.path().join(".vibeforge").exists());
        assert!(dir.path().join(".vibeforge/logs").exists());
        assert!(dir.path().join(".vibeforge/vibeforge.toml").exists());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();
        init_project(&dir);

        vibeforge()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_project_dir_flag() {
        let dir = create_temp_project();

        vibeforge()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("init")
            .assert()
            .success();

        assert!(dir.path().join(".vibeforge/vibeforge.toml").exists());
    }

    #[test]
    fn test_verbose_flag() {
        let dir = create_temp_project();
        init_project(&dir);

        vibeforge()
            .current_dir(dir.path())
            .args(["-v", "status"])
            .assert()
            .success();
    }
}

// =============================================================================
// Session Commands
// =============================================================================

mod session {
    use super::*;

    #[test]
    fn test_status_uninitialized() {
        let dir = create_temp_project();

        vibeforge()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("not initialized"));
    }

    #[test]
    fn test_status_without_session() {
        let dir = create_temp_project();
        init_project(&dir);

        vibeforge()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No session 'default' yet"));
    }

    #[test]
    fn test_status_shows_seeded_session() {
        let dir = create_temp_project();
        init_project(&dir);
        seed_session(&dir, "default");

        vibeforge()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Project:   todo-app"))
            .stdout(predicate::str::contains("Phase:     completed"))
            .stdout(predicate::str::contains("Quality:   96/100"))
            .stdout(predicate::str::contains("Messages:  2"))
            .stdout(predicate::str::contains("verified  js/app.js (javascript)"));
    }

    #[test]
    fn test_session_flag_selects_session() {
        let dir = create_temp_project();
        init_project(&dir);
        seed_session(&dir, "alpha");

        vibeforge()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No session 'default' yet"))
            .stdout(predicate::str::contains("Stored sessions: alpha"));

        vibeforge()
            .current_dir(dir.path())
            .args(["--session", "alpha", "status"])
            .assert()
            .success()
            .stdout(predicate::str::contains("todo-app"));
    }

    #[test]
    fn test_export_writes_files() {
        let dir = create_temp_project();
        init_project(&dir);
        seed_session(&dir, "default");

        vibeforge()
            .current_dir(dir.path())
            .args(["export", "out"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Exported 2 file(s)"))
            .stdout(predicate::str::contains("Skipped 1 file(s) without content"));

        assert_eq!(
            fs::read_to_string(dir.path().join("out/js/app.js")).unwrap(),
            "const todos = [];"
        );
        assert!(!dir.path().join("out/notes.md").exists());
    }

    #[test]
    fn test_export_without_session() {
        let dir = create_temp_project();
        init_project(&dir);

        vibeforge()
            .current_dir(dir.path())
            .args(["export", "out"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing to export"));

        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_reset_force_clears_session() {
        let dir = create_temp_project();
        init_project(&dir);
        seed_session(&dir, "default");

        vibeforge()
            .current_dir(dir.path())
            .args(["reset", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Session 'default' cleared"));

        vibeforge()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No session 'default' yet"));
    }
}

// =============================================================================
// Build Command
// =============================================================================

mod build {
    use super::*;

    #[test]
    fn test_build_requires_api_key() {
        let dir = create_temp_project();
        init_project(&dir);

        vibeforge()
            .current_dir(dir.path())
            .args(["build", "a todo app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No API key found"))
            .stderr(predicate::str::contains("VIBEFORGE_API_KEY"));
    }

    #[test]
    fn test_build_honours_custom_key_variable() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(
            dir.path().join(".vibeforge/vibeforge.toml"),
            "[collaborator]\napi_key_env = \"MY_TEAM_KEY\"\n",
        )
        .unwrap();

        vibeforge()
            .current_dir(dir.path())
            .env_remove("MY_TEAM_KEY")
            .args(["build", "a todo app"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("MY_TEAM_KEY"));
    }

    #[test]
    fn test_build_keeps_earlier_conversation() {
        let dir = create_temp_project();
        init_project(&dir);
        seed_session(&dir, "default");

        // Nothing listens on the discard port, so planning fails fast.
        vibeforge()
            .current_dir(dir.path())
            .env("VIBEFORGE_API_KEY", "test-key")
            .env("VIBEFORGE_BASE_URL", "http://127.0.0.1:9")
            .env("VIBEFORGE_TIMEOUT_SECS", "5")
            .args(["build", "a weather widget"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Build failed"));

        let store = SqliteSessionStore::open(&dir.path().join(".vibeforge/session.db")).unwrap();
        let conversation = store.load_conversation("default").unwrap().unwrap();
        let texts: Vec<&str> = conversation.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts.len(), 4);
        assert_eq!(&texts[..3], ["a todo app", "Built todo-app", "a weather widget"]);

        let project = store.load_project("default").unwrap().unwrap();
        assert_eq!(project.description, "a weather widget");
        assert_eq!(project.phase, Phase::Failed);
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        vibeforge()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No vibeforge.toml found"))
            .stdout(predicate::str::contains("max_iterations = 3"))
            .stdout(predicate::str::contains("quality_target = 95"))
            .stdout(predicate::str::contains("api_key = missing"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();

        vibeforge()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created vibeforge.toml"));

        let content = fs::read_to_string(dir.path().join(".vibeforge/vibeforge.toml")).unwrap();
        assert!(content.contains("[build]"));
        assert!(content.contains("max_iterations = 3"));
    }

    #[test]
    fn test_config_validate_no_config() {
        let dir = create_temp_project();

        vibeforge()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using defaults (valid)"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".vibeforge")).unwrap();
        fs::write(
            dir.path().join(".vibeforge/vibeforge.toml"),
            "[build]\nmax_iterations = 0\nquality_target = 101\n",
        )
        .unwrap();

        vibeforge()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("quality_target"))
            .stdout(predicate::str::contains("max_iterations"));
    }

    #[test]
    fn test_config_shows_env_overrides() {
        let dir = create_temp_project();
        init_project(&dir);

        vibeforge()
            .current_dir(dir.path())
            .env("VIBEFORGE_MODEL", "override-model")
            .env("VIBEFORGE_API_KEY", "sk-test")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("model = \"override-model\""))
            .stdout(predicate::str::contains("api_key = set"));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".vibeforge")).unwrap();
        fs::write(dir.path().join(".vibeforge/vibeforge.toml"), "[build\n").unwrap();

        vibeforge()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse vibeforge.toml"));
    }
}
