//! Wire types for the discovery REST API.
//!
//! Every response is a `{success, …}` envelope; `success: false` carries an
//! `error` message. `status` and `stats` payloads are backend-owned and kept
//! opaque.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::token::TokenRecord;

/// POST body for `/api/discovery/trigger`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TriggerScanRequest {
    pub max_tokens: u32,
    pub chain: Option<String>,
}

/// Response envelope for a triggered scan.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerScanResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Whatever else the backend reports about the queued scan.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub stats: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentTokensResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub tokens: Vec<TokenRecord>,
}
