//! CLI smoke tests: verify the commands that work without a bot token.
//!
//! These tests run the compiled binary against a scratch home directory.
//! No network access required.

use std::path::Path;
use std::process::Command;

use linkrelay::settings::{SettingsStore, SettingsUpdate};
use tempfile::TempDir;

const KEY: &str = "0123456789abcdef0123456789abcdef01234567";

/// Helper: run linkrelay in `home` and return (exit_code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_linkrelay");
    let output = Command::new(bin)
        .args(args)
        .current_dir(home)
        .env("HOME", home)
        .env("RUST_LOG", "off") // suppress tracing noise
        .env_remove("BOT_TOKEN")
        .env_remove("LINKRELAY_TELEGRAM_TOKEN")
        .env_remove("LINKRELAY_STORE_PATH")
        .output()
        .expect("failed to execute linkrelay binary");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn write_config(home: &TempDir, body: &str) -> String {
    let path = home.path().join("config.json");
    std::fs::write(&path, body).unwrap();
    path.display().to_string()
}

// ============================================================================
// Help & Version
// ============================================================================

#[test]
fn cli_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _stderr) = run_cli(home.path(), &[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("linkrelay"));
}

#[test]
fn cli_version_command() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _stderr) = run_cli(home.path(), &["version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("linkrelay"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn cli_config_check_reports_missing_token() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home, r#"{"telegram": {"token": ""}}"#);
    let (code, stdout, _stderr) = run_cli(home.path(), &["config", "check", "--config", &config]);
    assert_eq!(code, 0);
    assert!(stdout.contains("telegram.token is empty"));
}

#[test]
fn cli_config_check_accepts_valid_file() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home, r#"{"telegram": {"token": "123:abc"}}"#);
    let (code, stdout, _stderr) = run_cli(home.path(), &["--config", &config, "config", "check"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Configuration looks good!"));
}

#[test]
fn cli_config_show_redacts_token() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home, r#"{"telegram": {"token": "123:supersecret"}}"#);
    let (code, stdout, _stderr) = run_cli(home.path(), &["config", "show", "--config", &config]);
    assert_eq!(code, 0);
    assert!(!stdout.contains("supersecret"));
    assert!(stdout.contains("***"));
    assert!(stdout.contains("terasharelinks"));
}

#[test]
fn cli_start_refuses_invalid_config() {
    let home = TempDir::new().unwrap();
    let config = write_config(&home, r#"{"telegram": {"token": ""}}"#);
    let (code, _stdout, stderr) = run_cli(home.path(), &["start", "--config", &config]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid configuration"));
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn cli_settings_list_and_show() {
    let home = TempDir::new().unwrap();
    let store_path = home.path().join("settings.json");
    let mut store = SettingsStore::open(&store_path).unwrap();
    store.set("42", SettingsUpdate::api_key(KEY)).await.unwrap();
    store.set("42", SettingsUpdate::header("Hot deals")).await.unwrap();

    let config = write_config(
        &home,
        &format!(r#"{{"store": {{"path": "{}"}}}}"#, store_path.display()),
    );

    let (code, stdout, _stderr) = run_cli(home.path(), &["settings", "list", "--config", &config]);
    assert_eq!(code, 0);
    assert!(stdout.contains("42"));
    assert!(stdout.contains("1 user(s)"));

    let (code, stdout, _stderr) =
        run_cli(home.path(), &["settings", "show", "42", "--config", &config]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Hot deals"));
    assert!(!stdout.contains(KEY), "key must be masked");

    let (code, stdout, _stderr) =
        run_cli(home.path(), &["settings", "show", "99", "--config", &config]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No settings stored for user 99"));
}

#[test]
fn cli_settings_list_empty_store() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _stderr) = run_cli(home.path(), &["settings", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No users"));
}
