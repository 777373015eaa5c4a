//! Settings store inspection commands.

use anyhow::{Context, Result};

use linkrelay::config::Config;
use linkrelay::relay::replies::settings_summary;
use linkrelay::settings::SettingsStore;

use super::SettingsAction;

pub(crate) async fn cmd_settings(action: SettingsAction, config: Config) -> Result<()> {
    let path = config.store_path();
    let store = SettingsStore::open(&path)
        .with_context(|| format!("Failed to open settings store {}", path.display()))?;

    match action {
        SettingsAction::List => {
            if store.is_empty() {
                println!("No users in {}", path.display());
                return Ok(());
            }
            for user in store.users() {
                let settings = store.settings(user);
                println!(
                    "{:<16} key:{:<4} header:{:<4} footer:{:<4} text:{}",
                    user,
                    yes_no(settings.api_key.is_some()),
                    yes_no(settings.header.is_some()),
                    yes_no(settings.footer.is_some()),
                    if settings.text_enabled { "on" } else { "off" }
                );
            }
            println!();
            println!("{} user(s)", store.len());
        }
        SettingsAction::Show { user_id } => match store.get(&user_id) {
            Some(settings) => println!("{}", settings_summary(settings)),
            None => println!("No settings stored for user {}", user_id),
        },
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
