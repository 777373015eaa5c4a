//! User-facing reply texts.

use crate::config::ShortenerConfig;
use crate::settings::UserSettings;
use crate::utils::string::mask_secret;

pub const ASK_API_KEY: &str = "Please enter your API key:";
pub const ASK_HEADER: &str = "Please enter the header text:";
pub const ASK_FOOTER: &str = "Please enter the footer text:";

pub const API_KEY_ADDED: &str = "API token add successfully🥳! Now send me a link to shorten🎉.";
pub const INVALID_API_KEY: &str =
    "That doesn't look like a valid API key (40 lowercase hex characters). Please enter your API key:";
pub const HEADER_ADDED: &str = "Add header text successfully";
pub const FOOTER_ADDED: &str = "Add footer text successfully";

pub const HEADER_REMOVED: &str = "Remove header text successfully";
pub const NO_HEADER: &str = "No header was set.";
pub const FOOTER_REMOVED: &str = "Remove footer text successfully";
pub const NO_FOOTER: &str = "No footer was set.";

pub const TEXT_ENABLED: &str = "Enable text successfully";
pub const TEXT_DISABLED: &str = "Disable text successfully.";

pub const MISSING_API_KEY: &str = "Please provide your API token first.😊 using the 👉  /api command.";
pub const NOT_A_LINK: &str = "This is not a link😕... Please provide a valid link.";
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred. Please try again later.";

/// Replies that depend on configuration.
#[derive(Debug, Clone)]
pub struct Replies {
    service_name: String,
    api_page: String,
}

impl Replies {
    pub fn new(service_name: &str, api_page: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            api_page: api_page.to_string(),
        }
    }

    pub fn from_config(config: &ShortenerConfig) -> Self {
        Self::new(&config.service_name, &config.api_page)
    }

    /// Greeting sent for `/start`.
    pub fn welcome(&self, name: &str) -> String {
        let service = &self.service_name;
        format!(
            "{name}, I am {service}, Bulk Link Converter. I Can Convert Links Directly From Your {service} Account,\n\
             \n\
             1. Go To 👉 {page}\n\
             2. Then Copy API Key\n\
             3. Then click 👉 /api then paste your API Key\n\
             \n\
             If you send me a post with any links, text and images...\n\
             I will replace all links in the post to your {service} links.\n\
             And we will send back to you.\n\
             \n\
             Happy sharing and earning 💰💰💰\n\
             \n\
             Thanks for using {service} bot ❤️",
            name = name,
            service = service,
            page = self.api_page,
        )
    }
}

/// Summary of a user's settings for `/settings`. The API key is masked.
pub fn settings_summary(settings: &UserSettings) -> String {
    let api_key = settings
        .api_key
        .as_deref()
        .map(mask_secret)
        .unwrap_or_else(|| "not set".to_string());
    format!(
        "Your settings:\nAPI key: {}\nHeader: {}\nFooter: {}\nText: {}",
        api_key,
        settings.header.as_deref().unwrap_or("not set"),
        settings.footer.as_deref().unwrap_or("not set"),
        if settings.text_enabled {
            "enabled"
        } else {
            "disabled"
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_names_service_and_page() {
        let replies = Replies::from_config(&ShortenerConfig::default());
        let text = replies.welcome("Ada");
        assert!(text.starts_with("Ada, I am TeraShareLinks, Bulk Link Converter."));
        assert!(text.contains("1. Go To 👉 https://terasharelinks.xyz/member/tools/api\n"));
        assert!(text.contains("\n\nHappy sharing"));
        assert!(text.ends_with("Thanks for using TeraShareLinks bot ❤️"));
    }

    #[test]
    fn test_settings_summary_masks_key() {
        let settings = UserSettings {
            api_key: Some("0123456789abcdef0123456789abcdef01234567".into()),
            header: Some("Top".into()),
            footer: None,
            text_enabled: false,
        };
        let summary = settings_summary(&settings);
        assert!(summary.contains("API key: 0123****"));
        assert!(!summary.contains("0123456789abcdef"));
        assert!(summary.contains("Header: Top"));
        assert!(summary.contains("Footer: not set"));
        assert!(summary.contains("Text: disabled"));
    }
}
