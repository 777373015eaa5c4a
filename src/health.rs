//! Liveness endpoint and relay counters.
//!
//! - [`HealthRegistry`] holds named component checks (`telegram`,
//!   `settings_store`)
//! - [`start_health_server`] serves `/health` and `/ready` over raw TCP
//! - [`RelayMetrics`] are lock-free counters for the message pipeline
//! - [`start_periodic_metrics_flush`] logs the counters every minute
//!
//! The listen port only answers liveness probes from the hosting platform;
//! it plays no part in talking to Telegram.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::{RelayError, Result};

const METRICS_FLUSH_INTERVAL_SECS: u64 = 60;

// ============================================================================
// HealthStatus / HealthCheck
// ============================================================================

/// The status of a single named health component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Component is operating normally.
    Ok,
    /// Component works with reduced guarantees (e.g. settings not durable).
    Degraded,
    /// Component is unavailable.
    Down,
}

impl HealthStatus {
    fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Ok => "ok",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
        }
    }
}

/// A named health check entry managed by [`HealthRegistry`].
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl HealthCheck {
    pub fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: None,
        }
    }
}

// ============================================================================
// HealthRegistry
// ============================================================================

/// Registry of named component health checks.
///
/// # Example
/// ```
/// use linkrelay::health::{HealthCheck, HealthRegistry, HealthStatus};
///
/// let registry = HealthRegistry::new();
/// registry.register(HealthCheck::new("telegram", HealthStatus::Ok));
/// assert!(registry.is_ready());
/// ```
#[derive(Clone)]
pub struct HealthRegistry {
    checks: Arc<RwLock<HashMap<String, HealthCheck>>>,
    start_time: Instant,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            checks: Arc::new(RwLock::new(HashMap::new())),
            start_time: Instant::now(),
        }
    }

    /// Register a check, replacing any existing check with the same name.
    pub fn register(&self, check: HealthCheck) {
        self.checks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(check.name.clone(), check);
    }

    /// Update an existing check. No-op for unknown names.
    pub fn update(&self, name: &str, status: HealthStatus, message: Option<String>) {
        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(check) = checks.get_mut(name) {
            check.status = status;
            check.message = message;
        }
    }

    /// Returns `true` when no registered check is [`HealthStatus::Down`].
    pub fn is_ready(&self) -> bool {
        self.checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .all(|c| c.status != HealthStatus::Down)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    fn render_checks(&self) -> serde_json::Value {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        let map: serde_json::Map<String, serde_json::Value> = checks
            .values()
            .map(|c| {
                let mut entry = serde_json::json!({ "status": c.status.as_str() });
                if let Some(msg) = &c.message {
                    entry["message"] = serde_json::Value::String(msg.clone());
                }
                (c.name.clone(), entry)
            })
            .collect();
        serde_json::Value::Object(map)
    }

    pub(crate) fn health_body(&self) -> String {
        serde_json::json!({
            "status": "ok",
            "uptime_secs": self.uptime().as_secs(),
            "checks": self.render_checks(),
        })
        .to_string()
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RelayMetrics
// ============================================================================

/// Lock-free counters for the message pipeline.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Inbound messages handled.
    pub messages: AtomicU64,
    /// Links successfully shortened.
    pub links_shortened: AtomicU64,
    /// Shortening calls that failed and were replaced by the failure text.
    pub shorten_failures: AtomicU64,
    /// Replies telling the user their message had no usable link.
    pub not_a_link: AtomicU64,
    /// Handler errors and panics answered with the generic reply.
    pub errors: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shortened(&self, count: u64) {
        self.links_shortened.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_shorten_failures(&self, count: u64) {
        self.shorten_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_not_a_link(&self) {
        self.not_a_link.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit current counters as a structured log line.
    pub fn emit(&self, reason: &str) {
        info!(
            event = "relay_metrics",
            reason = reason,
            messages = self.messages.load(Ordering::Relaxed),
            links_shortened = self.links_shortened.load(Ordering::Relaxed),
            shorten_failures = self.shorten_failures.load(Ordering::Relaxed),
            not_a_link = self.not_a_link.load(Ordering::Relaxed),
            errors = self.errors.load(Ordering::Relaxed),
            "Relay metrics"
        );
    }
}

// ============================================================================
// Health server (raw TCP)
// ============================================================================

/// Start the HTTP liveness server.
///
/// Serves:
/// - `GET /health` (`/healthz`) -> 200 with `{"status":"ok","uptime_secs":N,"checks":{...}}`
/// - `GET /ready` (`/readyz`) -> 200 unless a check is Down, else 503
/// - anything else -> 404
///
/// Returns a `JoinHandle` so callers can abort on shutdown.
pub async fn start_health_server(
    host: &str,
    port: u16,
    registry: HealthRegistry,
) -> Result<tokio::task::JoinHandle<()>> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        RelayError::Config(format!("Failed to bind health server on {}: {}", addr, e))
    })?;
    info!(addr = %addr, "Health server listening");
    Ok(serve(listener, registry))
}

fn serve(listener: TcpListener, registry: HealthRegistry) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut stream, _addr)) => {
                    let registry = registry.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 512];
                        let n = match tokio::time::timeout(
                            Duration::from_secs(5),
                            stream.read(&mut buf),
                        )
                        .await
                        {
                            Ok(Ok(n)) => n,
                            _ => return,
                        };

                        let request = String::from_utf8_lossy(&buf[..n]);
                        let (status_line, body) = route(&request, &registry);
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line,
                            body.len(),
                            body
                        );

                        let _ = stream.write_all(response.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Health server accept error");
                }
            }
        }
    })
}

fn route(request: &str, registry: &HealthRegistry) -> (&'static str, String) {
    let request_line = request.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let raw_path = parts.next().unwrap_or_default();
    let path = raw_path.split('?').next().unwrap_or(raw_path);

    match (method, path) {
        ("GET", "/health") | ("GET", "/healthz") => ("200 OK", registry.health_body()),
        ("GET", "/ready") | ("GET", "/readyz") => {
            if registry.is_ready() {
                ("200 OK", "{\"status\":\"ready\"}".to_string())
            } else {
                (
                    "503 Service Unavailable",
                    "{\"status\":\"not_ready\"}".to_string(),
                )
            }
        }
        _ => ("404 Not Found", "{\"error\":\"not_found\"}".to_string()),
    }
}

// ============================================================================
// Periodic metrics flush
// ============================================================================

/// Emit [`RelayMetrics`] every 60 seconds, and once more on shutdown.
pub fn start_periodic_metrics_flush(
    metrics: Arc<RelayMetrics>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(METRICS_FLUSH_INTERVAL_SECS));
        interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    metrics.emit("periodic");
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        metrics.emit("shutdown");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_ready_when_empty() {
        assert!(HealthRegistry::new().is_ready());
    }

    #[test]
    fn test_registry_not_ready_when_check_down() {
        let reg = HealthRegistry::new();
        reg.register(HealthCheck::new("telegram", HealthStatus::Down));
        assert!(!reg.is_ready());
    }

    #[test]
    fn test_degraded_store_is_still_ready() {
        let reg = HealthRegistry::new();
        reg.register(HealthCheck::new("telegram", HealthStatus::Ok));
        reg.register(HealthCheck::new("settings_store", HealthStatus::Degraded));
        assert!(reg.is_ready());
    }

    #[test]
    fn test_update_check_status() {
        let reg = HealthRegistry::new();
        reg.register(HealthCheck::new("telegram", HealthStatus::Ok));
        reg.update("telegram", HealthStatus::Down, Some("get_me failed".into()));
        assert!(!reg.is_ready());

        reg.update("ghost", HealthStatus::Down, None);
        assert_eq!(reg.checks.read().unwrap().len(), 1);
    }

    #[test]
    fn test_health_body_escapes_messages() {
        let reg = HealthRegistry::new();
        let mut check = HealthCheck::new("settings_store", HealthStatus::Degraded);
        check.message = Some("cannot write \"settings.json\"".into());
        reg.register(check);

        let body: serde_json::Value = serde_json::from_str(&reg.health_body()).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["settings_store"]["status"], "degraded");
        assert_eq!(
            body["checks"]["settings_store"]["message"],
            "cannot write \"settings.json\""
        );
    }

    #[test]
    fn test_route() {
        let reg = HealthRegistry::new();
        assert_eq!(route("GET /healthz HTTP/1.1\r\n", &reg).0, "200 OK");
        assert_eq!(route("GET /ready?x=1 HTTP/1.1\r\n", &reg).0, "200 OK");
        assert_eq!(route("POST /health HTTP/1.1\r\n", &reg).0, "404 Not Found");
        assert_eq!(route("", &reg).0, "404 Not Found");

        reg.register(HealthCheck::new("telegram", HealthStatus::Down));
        assert_eq!(
            route("GET /readyz HTTP/1.1\r\n", &reg).0,
            "503 Service Unavailable"
        );
    }

    #[test]
    fn test_metrics_counters() {
        let m = RelayMetrics::new();
        m.record_message();
        m.record_shortened(3);
        m.record_shorten_failures(1);
        m.record_not_a_link();
        m.record_error();
        assert_eq!(m.messages.load(Ordering::Relaxed), 1);
        assert_eq!(m.links_shortened.load(Ordering::Relaxed), 3);
        assert_eq!(m.shorten_failures.load(Ordering::Relaxed), 1);
        assert_eq!(m.not_a_link.load(Ordering::Relaxed), 1);
        assert_eq!(m.errors.load(Ordering::Relaxed), 1);
        m.emit("test");
    }

    #[tokio::test]
    async fn test_server_serves_health() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reg = HealthRegistry::new();
        reg.register(HealthCheck::new("telegram", HealthStatus::Ok));
        let handle = serve(listener, reg);

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("\"telegram\""));
        handle.abort();
    }

    #[tokio::test]
    async fn test_metrics_flush_stops_on_shutdown() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = start_periodic_metrics_flush(Arc::new(RelayMetrics::new()), rx);
        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_millis(500), handle).await;
        assert!(result.is_ok());
    }
}
