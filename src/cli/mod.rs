//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod config;
pub mod settings;
pub mod shorten;
pub mod start;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use linkrelay::config::Config;

#[derive(Parser)]
#[command(name = "linkrelay")]
#[command(version)]
#[command(about = "Telegram bot that shortens every link in a post", long_about = None)]
struct Cli {
    /// Path to the config file (default: ~/.linkrelay/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot until Ctrl-C
    Start,
    /// Inspect or validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Inspect the per-user settings store
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Shorten a single URL through the configured endpoint
    Shorten {
        /// URL to shorten
        url: String,
        /// API key to shorten with
        #[arg(long)]
        key: String,
        /// Optional alias to request
        #[arg(long)]
        alias: Option<String>,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Validate the configuration
    Check,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SettingsAction {
    /// List users with stored settings
    List,
    /// Show one user's settings
    Show {
        /// Telegram user id
        user_id: String,
    },
}

/// Load config from `path`, or the default location when `None`.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load().with_context(|| "Failed to load configuration"),
    }
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    // Pick up BOT_TOKEN and friends from a local .env before reading config.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    // Respect the logging settings when the config loads; fall back to
    // defaults so a broken file still gets a readable error.
    let logging_cfg = load_config(config_path)
        .map(|c| c.logging)
        .unwrap_or_default();
    linkrelay::utils::logging::init_logging(&logging_cfg);

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Start) => {
            start::cmd_start(load_config(config_path)?).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(action, config_path).await?;
        }
        Some(Commands::Settings { action }) => {
            settings::cmd_settings(action, load_config(config_path)?).await?;
        }
        Some(Commands::Shorten { url, key, alias }) => {
            shorten::cmd_shorten(load_config(config_path)?, url, key, alias).await?;
        }
    }

    Ok(())
}

/// Display version information
fn cmd_version() {
    println!("linkrelay {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Telegram link-shortening relay bot");
}
