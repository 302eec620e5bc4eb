//! High-level client — `DiscoveryClient` and its builder.
//!
//! Ties the pieces together: the realtime connection (`ws`), the callback
//! registry, the REST gateway (`http`), and the client-side counters. One
//! instance per logical session; configuration is fixed at build time.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use crate::error::DiscoveryError;
use crate::http::wire::TriggerScanResponse;
use crate::http::DiscoveryHttp;
use crate::stats::{ClientStats, SharedStats, StatsInner};
use crate::token::TokenRecord;
use crate::ws::client::WsClient;
use crate::ws::dispatcher::{EventDispatcher, SubscriptionHandle};
use crate::ws::{ConnectionState, DiscoveryEvent, EventKind, WsConfig};

/// Scans default to this many tokens when the caller does not say.
const DEFAULT_SCAN_MAX_TOKENS: u32 = 20;

/// Recent-token queries default to this page size.
const DEFAULT_RECENT_LIMIT: u32 = 50;

/// Options for [`DiscoveryClient::trigger_scan`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOptions {
    /// Number of tokens to scan. `None` or 0 means the default of 20.
    pub max_tokens: Option<u32>,
    /// Restrict the scan to one chain.
    pub chain: Option<String>,
}

/// Client for the Token Scanner discovery service.
///
/// ```rust,ignore
/// use token_discovery_client::prelude::*;
///
/// let mut client = DiscoveryClient::builder()
///     .base_url("https://scanner.example.com")
///     .build();
///
/// client.on(EventKind::NewToken, |event| {
///     if let DiscoveryEvent::NewToken(token) = event {
///         println!("New token: {}", token.label());
///     }
/// });
///
/// client.connect().await;
/// ```
pub struct DiscoveryClient {
    http: DiscoveryHttp,
    ws: WsClient,
    dispatcher: Arc<EventDispatcher>,
    stats: SharedStats,
}

impl DiscoveryClient {
    pub fn builder() -> DiscoveryClientBuilder {
        DiscoveryClientBuilder::default()
    }

    // ── Connection lifecycle ─────────────────────────────────────────────

    /// Open the realtime connection. See [`WsClient::connect`].
    pub async fn connect(&mut self) {
        self.ws.connect().await;
    }

    /// Close the connection and disable auto-reconnect for this instance.
    /// See [`WsClient::disconnect`].
    pub async fn disconnect(&mut self) {
        self.ws.disconnect().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.ws.state()
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_connected()
    }

    // ── Events ───────────────────────────────────────────────────────────

    /// Register a callback for one event kind. Callbacks fire in
    /// registration order; the handle unregisters exactly this one.
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&DiscoveryEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.dispatcher.on(kind, callback)
    }

    /// Unregister a callback. Idempotent.
    pub fn off(&self, handle: &SubscriptionHandle) {
        self.dispatcher.off(handle)
    }

    // ── Actions ──────────────────────────────────────────────────────────

    /// Trigger a discovery scan of the latest tokens.
    ///
    /// The scan is shared between all connected clients, so an open
    /// realtime session is required even though the call itself travels
    /// over HTTP.
    pub async fn trigger_scan(
        &self,
        options: ScanOptions,
    ) -> Result<TriggerScanResponse, DiscoveryError> {
        if !self.is_connected() {
            return Err(DiscoveryError::NotConnected);
        }
        let max_tokens = effective_max_tokens(options.max_tokens);
        tracing::info!(max_tokens, chain = ?options.chain, "Triggering discovery scan");
        Ok(self
            .http
            .trigger_scan(max_tokens, options.chain.as_deref())
            .await?)
    }

    /// Fetch the service status snapshot. Requires an open session.
    pub async fn request_status(&self) -> Result<Value, DiscoveryError> {
        if !self.is_connected() {
            return Err(DiscoveryError::NotConnected);
        }
        Ok(self.http.get_status().await?)
    }

    /// Fetch service-side discovery statistics. Safe to call anytime.
    pub async fn get_stats(&self) -> Result<Value, DiscoveryError> {
        Ok(self.http.get_stats().await?)
    }

    /// Fetch recently discovered tokens. Safe to call anytime.
    /// `limit` defaults to 50.
    pub async fn recent_tokens(
        &self,
        limit: Option<u32>,
        chain: Option<&str>,
    ) -> Result<Vec<TokenRecord>, DiscoveryError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        Ok(self.http.get_recent(limit, chain).await?)
    }

    // ── Stats ────────────────────────────────────────────────────────────

    /// Read-only snapshot of the client-side counters.
    pub fn client_stats(&self) -> ClientStats {
        self.stats.snapshot(self.is_connected(), Utc::now())
    }
}

fn effective_max_tokens(requested: Option<u32>) -> u32 {
    match requested {
        Some(n) if n > 0 => n,
        _ => DEFAULT_SCAN_MAX_TOKENS,
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct DiscoveryClientBuilder {
    base_url: String,
    ws_url: Option<String>,
    auto_reconnect: bool,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
}

impl Default for DiscoveryClientBuilder {
    fn default() -> Self {
        Self {
            base_url: crate::network::DEFAULT_API_URL.to_string(),
            ws_url: None,
            auto_reconnect: true,
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 10,
        }
    }
}

impl DiscoveryClientBuilder {
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Override the WebSocket URL. By default it is derived from the base
    /// URL (`https://host` → `wss://host/ws`).
    pub fn ws_url(mut self, url: &str) -> Self {
        self.ws_url = Some(url.to_string());
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Base reconnect delay. The actual delay grows linearly with the
    /// attempt number, capped at five times this value.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn build(self) -> DiscoveryClient {
        let ws_url = self
            .ws_url
            .unwrap_or_else(|| derive_ws_url(&self.base_url));
        let config = WsConfig {
            url: ws_url,
            auto_reconnect: self.auto_reconnect,
            reconnect_delay_ms: self.reconnect_delay.as_millis() as u64,
            max_reconnect_attempts: self.max_reconnect_attempts,
        };

        let dispatcher = Arc::new(EventDispatcher::new());
        let stats: SharedStats = Arc::new(StatsInner::default());

        DiscoveryClient {
            http: DiscoveryHttp::new(&self.base_url),
            ws: WsClient::new(config, Arc::clone(&dispatcher), Arc::clone(&stats)),
            dispatcher,
            stats,
        }
    }
}

fn derive_ws_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let host = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        trimmed.to_string()
    };
    format!("{}/ws", host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = DiscoveryClient::builder().build();
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(!client.is_connected());

        let stats = client.client_stats();
        assert_eq!(stats.tokens_received, 0);
        assert_eq!(stats.reconnect_attempts, 0);
        assert!(stats.connected_at.is_none());
    }

    #[test]
    fn test_derive_ws_url() {
        assert_eq!(
            derive_ws_url("https://scanner.example.com"),
            "wss://scanner.example.com/ws"
        );
        assert_eq!(
            derive_ws_url("http://localhost:5000/"),
            "ws://localhost:5000/ws"
        );
        assert_eq!(
            derive_ws_url(crate::network::DEFAULT_API_URL),
            crate::network::DEFAULT_WS_URL
        );
    }

    #[test]
    fn test_effective_max_tokens() {
        assert_eq!(effective_max_tokens(None), 20);
        assert_eq!(effective_max_tokens(Some(0)), 20);
        assert_eq!(effective_max_tokens(Some(5)), 5);
    }

    #[test]
    fn test_scan_options_default() {
        let options = ScanOptions::default();
        assert_eq!(options.max_tokens, None);
        assert_eq!(options.chain, None);
    }
}
