//! Config show/check command handlers.

use std::path::Path;

use anyhow::{Context, Result};

use linkrelay::config::Config;

use super::{load_config, ConfigAction};

/// Show or validate configuration.
pub(crate) async fn cmd_config(action: ConfigAction, path: Option<&Path>) -> Result<()> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::path);

    match action {
        ConfigAction::Show => {
            let config = load_config(path)?;
            let rendered = serde_json::to_string_pretty(&config.redacted())
                .context("Failed to render config")?;
            println!("# {}", config_path.display());
            println!("{}", rendered);
        }
        ConfigAction::Check => {
            println!("Config file: {}", config_path.display());
            if !config_path.exists() {
                println!("[OK] No config file found (using defaults and environment)");
            }

            let config = match load_config(path) {
                Ok(config) => config,
                Err(e) => {
                    println!("[ERROR] {:#}", e);
                    return Ok(());
                }
            };

            match config.validate() {
                Ok(()) => println!("\nConfiguration looks good!"),
                Err(problems) => {
                    for problem in &problems {
                        println!("[ERROR] {}", problem);
                    }
                    println!("\nFound {} error(s)", problems.len());
                }
            }
        }
    }
    Ok(())
}
