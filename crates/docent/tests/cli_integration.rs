//! CLI integration tests for the Docent command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Argument parsing works as expected
//! - Config commands work against an isolated config directory
//!
//! Note: nothing here talks to a model or search provider.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the docent binary, isolated from the user's config.
fn docent(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("docent").unwrap();
    cmd.current_dir(home.path())
        .env("DOCENT_CONFIG_DIR", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env_remove("GEMINI_API_KEY")
        .env_remove("BRAVE_API_KEY");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Docent"))
        .stdout(predicate::str::contains("documentation research assistant"));
}

#[test]
fn test_version_displays() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("docent"));
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("research"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_research_help_lists_flags() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .args(["research", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--max-iterations"))
        .stdout(predicate::str::contains("--plan"))
        .stdout(predicate::str::contains("--site"))
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--output"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument Parsing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_no_subcommand_fails() {
    let home = TempDir::new().unwrap();
    docent(&home).assert().failure();
}

#[test]
fn test_plan_conflicts_with_question() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .args(["research", "How do sessions work?", "--plan", "plan.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_max_iterations_must_be_numeric() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .args(["research", "--max-iterations", "many", "--plan", "plan.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_zero_max_iterations_rejected() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .args(["research", "--max-iterations", "0", "--plan", "plan.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn test_missing_plan_file_reports_error() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .args(["research", "--plan", "missing.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("Reading plan file"));
}

#[test]
fn test_plan_file_without_goals_rejected() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("plan.md"), "just prose, no bullets\n").unwrap();
    docent(&home)
        .args(["research", "--plan", "plan.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parsing plan file"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_uses_config_dir() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(
            home.path().join("config").display().to_string(),
        ));
}

#[test]
fn test_config_dir_flag_overrides_env() {
    let home = TempDir::new().unwrap();
    let other = home.path().join("elsewhere");
    docent(&home)
        .args(["--config-dir", other.to_str().unwrap(), "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere"));
}

#[test]
fn test_config_show_defaults() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No config files loaded"))
        .stdout(predicate::str::contains("max iterations:  5"))
        .stdout(predicate::str::contains("adk-docs"));
}

#[test]
fn test_config_init_then_show() {
    let home = TempDir::new().unwrap();
    docent(&home)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));

    assert!(home.path().join("config").join("config.toml").exists());

    docent(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config files:"))
        .stdout(predicate::str::contains("gemini-2.5-pro"))
        .stdout(predicate::str::contains("research.critic_llm -> llm.critic"))
        .stdout(predicate::str::contains("no key (set GEMINI_API_KEY)"));

    docent(&home)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_project_config_overrides_user_config() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("docent.toml"),
        "[research]\nmax_search_iterations = 2\n",
    )
    .unwrap();

    docent(&home)
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 config file(s) loaded"));

    docent(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max iterations:  2"));
}

#[test]
fn test_invalid_config_reports_error() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("docent.toml"),
        "[research]\nmax_search_iterations = 0\n",
    )
    .unwrap();

    docent(&home)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_config_show_json() {
    let home = TempDir::new().unwrap();
    let output = docent(&home)
        .args(["--json", "config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["research"]["max_search_iterations"], 5);
    assert_eq!(value["search"]["provider"], "duckduckgo");
    assert!(value["roles"]["worker"]["error"].is_string());
}
