//! Low-level HTTP client — `DiscoveryHttp`.
//!
//! One method per API endpoint. Unwraps the `{success, …}` envelope and
//! turns `success: false` into [`HttpError::Rejected`] with the server's
//! message (or an endpoint-specific fallback).

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::HttpError;
use crate::http::wire::{
    RecentTokensResponse, StatsResponse, StatusResponse, TriggerScanRequest, TriggerScanResponse,
};
use crate::token::TokenRecord;

/// Low-level HTTP client for the discovery REST API.
#[derive(Clone)]
pub struct DiscoveryHttp {
    base_url: String,
    client: Client,
}

impl DiscoveryHttp {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .pool_max_idle_per_host(10)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Kick off a discovery scan. The scan is shared across all connected
    /// clients; its progress comes back over the realtime channel.
    pub async fn trigger_scan(
        &self,
        max_tokens: u32,
        chain: Option<&str>,
    ) -> Result<TriggerScanResponse, HttpError> {
        let url = format!("{}/api/discovery/trigger", self.base_url);
        let body = TriggerScanRequest {
            max_tokens,
            chain: chain.map(str::to_string),
        };
        let resp: TriggerScanResponse = self.post(&url, &body).await?;
        if resp.success {
            Ok(resp)
        } else {
            Err(rejected(resp.error, "Scan failed"))
        }
    }

    /// Fetch the current service status snapshot.
    pub async fn get_status(&self) -> Result<Value, HttpError> {
        let url = format!("{}/api/discovery/status", self.base_url);
        let resp: StatusResponse = self.get(&url).await?;
        if resp.success {
            Ok(resp.status.unwrap_or(Value::Null))
        } else {
            Err(rejected(resp.error, "Failed to get status"))
        }
    }

    /// Fetch service-side discovery statistics.
    pub async fn get_stats(&self) -> Result<Value, HttpError> {
        let url = format!("{}/api/discovery/stats", self.base_url);
        let resp: StatsResponse = self.get(&url).await?;
        if resp.success {
            Ok(resp.stats.unwrap_or(Value::Null))
        } else {
            Err(rejected(resp.error, "Failed to get stats"))
        }
    }

    /// Fetch recently discovered tokens, newest first.
    pub async fn get_recent(
        &self,
        limit: u32,
        chain: Option<&str>,
    ) -> Result<Vec<TokenRecord>, HttpError> {
        let mut url = format!("{}/api/discovery/recent?limit={}", self.base_url, limit);
        if let Some(chain) = chain {
            url = format!("{}&chain={}", url, urlencoding::encode(chain));
        }
        let resp: RecentTokensResponse = self.get(&url).await?;
        if resp.success {
            Ok(resp.tokens)
        } else {
            Err(rejected(resp.error, "Failed to get recent tokens"))
        }
    }

    // ── Internal HTTP methods ────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        self.request(reqwest::Method::GET, url, None::<&()>).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        self.request(reqwest::Method::POST, url, Some(body)).await
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<T, HttpError> {
        let mut req = self.client.request(method, url);
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;
        let status = resp.status();

        if status.is_success() {
            return Ok(resp.json::<T>().await?);
        }

        let status_code = status.as_u16();
        let body_text = resp.text().await.unwrap_or_default();

        match status_code {
            401 => Err(HttpError::Unauthorized),
            404 => Err(HttpError::NotFound(body_text)),
            400..=499 => Err(HttpError::BadRequest(body_text)),
            _ => Err(HttpError::ServerError {
                status: status_code,
                body: body_text,
            }),
        }
    }
}

fn rejected(error: Option<String>, fallback: &str) -> HttpError {
    HttpError::Rejected(error.unwrap_or_else(|| fallback.to_string()))
}
