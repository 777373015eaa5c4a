//! One-off shortening command.

use anyhow::{Context, Result};

use linkrelay::config::Config;
use linkrelay::shortener::{HttpShortener, Shortener};

pub(crate) async fn cmd_shorten(
    config: Config,
    url: String,
    key: String,
    alias: Option<String>,
) -> Result<()> {
    let shortener = HttpShortener::from_config(&config.shortener)
        .with_context(|| "Failed to build shortener client")?;

    let short = shortener
        .shorten(&url, &key, alias.as_deref())
        .await
        .with_context(|| format!("Shortening {} via {} failed", url, shortener.endpoint()))?;

    println!("{}", short);
    Ok(())
}
