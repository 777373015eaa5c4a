//! The link pipeline: extract, classify, shorten, splice, compose.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::compose::{compose, Layout};
use crate::health::RelayMetrics;
use crate::links::{scan, ExtractedLink};
use crate::settings::UserSettings;
use crate::shortener::Shortener;
use crate::utils::string::preview;

/// What the pipeline produced for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutput {
    /// Reply body ready to send (as text or caption).
    Composed(String),
    /// No usable link; the user gets the not-a-link notice.
    NotALink,
}

/// Turns a post into its shortened form for one user.
pub struct LinkPipeline {
    shortener: Arc<dyn Shortener>,
    failure_message: String,
    metrics: Arc<RelayMetrics>,
}

impl LinkPipeline {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        failure_message: &str,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            shortener,
            failure_message: failure_message.to_string(),
            metrics,
        }
    }

    /// Run the pipeline over `text` using the user's key and layout.
    ///
    /// All external links are shortened concurrently; results keep the order
    /// the links appear in. A failed call is replaced by the failure message
    /// and never aborts the reply.
    pub async fn run(&self, text: &str, api_key: &str, settings: &UserSettings) -> PipelineOutput {
        let links = scan(text);
        if links.is_empty() {
            return PipelineOutput::NotALink;
        }

        let include_text = settings.text_enabled;
        let replacements =
            join_all(links.iter().map(|link| self.replace(link, api_key, include_text))).await;

        let raws: Vec<&str> = links.iter().map(|l| l.raw.as_str()).collect();
        let layout = Layout::new(
            settings.header.as_deref(),
            settings.footer.as_deref(),
            include_text,
        );
        match compose(text, &raws, &replacements, &layout) {
            Some(body) => PipelineOutput::Composed(body),
            None => PipelineOutput::NotALink,
        }
    }

    async fn replace(&self, link: &ExtractedLink, api_key: &str, include_text: bool) -> String {
        if link.internal {
            return if include_text {
                link.raw.clone()
            } else {
                String::new()
            };
        }

        match self.shortener.shorten(&link.raw, api_key, None).await {
            Ok(short) => {
                debug!(link = %preview(&link.raw, 80), short = %short, "Link shortened");
                self.metrics.record_shortened(1);
                short
            }
            Err(e) => {
                warn!(link = %preview(&link.raw, 80), error = %e, "Shortening failed");
                self.metrics.record_shorten_failures(1);
                self.failure_message.clone()
            }
        }
    }
}
