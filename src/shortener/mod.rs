//! Shortening API client.
//!
//! A [`Shortener`] turns one long URL into a short one using the caller's
//! API key. The production implementation, [`HttpShortener`], talks to a
//! single process-wide endpoint:
//!
//! ```text
//! GET {endpoint}?api={key}&url={encoded_url}[&alias={alias}]&format=text
//! ```
//!
//! A 2xx response body (trimmed) is the short URL. Anything else is a
//! [`ShortenError`]; callers decide how to degrade.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::ShortenerConfig;
use crate::error::{RelayError, Result, ShortenError};

const SHORTENER_USER_AGENT: &str = concat!("linkrelay/", env!("CARGO_PKG_VERSION"));

/// Anything that can shorten a URL on behalf of a user.
#[async_trait]
pub trait Shortener: Send + Sync {
    /// Shorten `link` using `api_key`, optionally requesting `alias`.
    async fn shorten(
        &self,
        link: &str,
        api_key: &str,
        alias: Option<&str>,
    ) -> std::result::Result<String, ShortenError>;
}

/// Shortener backed by the HTTP text API.
pub struct HttpShortener {
    client: Client,
    endpoint: String,
}

impl HttpShortener {
    /// Create a shortener from config, honouring `timeout_secs` when set.
    pub fn from_config(config: &ShortenerConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(SHORTENER_USER_AGENT);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Shortener for HttpShortener {
    async fn shorten(
        &self,
        link: &str,
        api_key: &str,
        alias: Option<&str>,
    ) -> std::result::Result<String, ShortenError> {
        let mut query: Vec<(&str, &str)> = vec![("api", api_key), ("url", link)];
        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            query.push(("alias", alias));
        }
        query.push(("format", "text"));

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| ShortenError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ShortenError::Body(e.to_string()))?;

        if !status.is_success() {
            return Err(ShortenError::Status {
                status: status.as_u16(),
                body: crate::utils::string::preview(body.trim(), 200),
            });
        }

        let short = body.trim().to_string();
        debug!(link = link, short = %short, "Link shortened");
        Ok(short)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles shared by the pipeline and controller tests.

    use super::*;
    use std::sync::Mutex;

    /// Records every call and answers `{prefix}{n}` (1-based call count),
    /// or fails for links containing `fail_marker`.
    pub struct RecordingShortener {
        pub calls: Mutex<Vec<(String, String)>>,
        prefix: String,
        fail_marker: Option<String>,
    }

    impl RecordingShortener {
        pub fn new(prefix: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                prefix: prefix.to_string(),
                fail_marker: None,
            }
        }

        pub fn failing_on(mut self, marker: &str) -> Self {
            self.fail_marker = Some(marker.to_string());
            self
        }

        pub fn links(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(link, _)| link.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Shortener for RecordingShortener {
        async fn shorten(
            &self,
            link: &str,
            api_key: &str,
            _alias: Option<&str>,
        ) -> std::result::Result<String, ShortenError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((link.to_string(), api_key.to_string()));
                calls.len()
            };
            if let Some(marker) = &self.fail_marker {
                if link.contains(marker.as_str()) {
                    return Err(ShortenError::Status {
                        status: 500,
                        body: "boom".into(),
                    });
                }
            }
            Ok(format!("{}{}", self.prefix, n))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the request line.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{}/api", addr), handle)
    }

    fn shortener_for(endpoint: &str) -> HttpShortener {
        HttpShortener::from_config(&ShortenerConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_trimmed_body() {
        let (endpoint, server) = serve_once("200 OK", "  https://sho.rt/abc \n").await;
        let shortener = shortener_for(&endpoint);

        let short = shortener
            .shorten("https://example.com/a b?x=1&y=2", "k3y", None)
            .await
            .unwrap();
        assert_eq!(short, "https://sho.rt/abc");

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /api?api=k3y&url="), "{}", request_line);
        assert!(request_line.contains("url=https%3A%2F%2Fexample.com%2Fa"));
        assert!(request_line.contains("%3Fx%3D1%26y%3D2"));
        assert!(request_line.contains("&format=text"));
        assert!(!request_line.contains("alias="));
    }

    #[tokio::test]
    async fn test_alias_is_sent_before_format() {
        let (endpoint, server) = serve_once("200 OK", "https://sho.rt/mine").await;
        let shortener = shortener_for(&endpoint);

        shortener
            .shorten("https://example.com", "k", Some("mine"))
            .await
            .unwrap();

        let request_line = server.await.unwrap();
        assert!(request_line.contains("&alias=mine&format=text"), "{}", request_line);
    }

    #[tokio::test]
    async fn test_empty_alias_is_omitted() {
        let (endpoint, server) = serve_once("200 OK", "s").await;
        let shortener = shortener_for(&endpoint);
        shortener
            .shorten("https://example.com", "k", Some(""))
            .await
            .unwrap();
        assert!(!server.await.unwrap().contains("alias="));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (endpoint, server) = serve_once("403 Forbidden", "invalid api key").await;
        let shortener = shortener_for(&endpoint);

        let err = shortener
            .shorten("https://example.com", "bad", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(403));
        assert!(err.to_string().contains("invalid api key"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let shortener = shortener_for(&format!("http://{}/api", addr));
        let err = shortener
            .shorten("https://example.com", "k", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenError::Transport(_)));
    }

    #[test]
    fn test_from_config_uses_endpoint() {
        let config = ShortenerConfig {
            endpoint: "https://short.example/api".to_string(),
            timeout_secs: Some(5),
            ..Default::default()
        };
        let shortener = HttpShortener::from_config(&config).unwrap();
        assert_eq!(shortener.endpoint(), "https://short.example/api");
    }
}
