//! Unified client error types.

use thiserror::Error;

/// Top-level client error.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The call requires an open realtime session and there is none.
    #[error("Not connected to the discovery service")]
    NotConnected,

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// HTTP-layer errors.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Well-formed response with `success: false` — carries the server's
    /// message, or an endpoint-specific fallback when the server sent none.
    #[error("{0}")]
    Rejected(String),

    #[error("Server error {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// WebSocket errors. Lifecycle failures are never returned to call sites;
/// they reach subscribers through the `Error` event, formatted from these.
#[derive(Error, Debug)]
pub enum WsError {
    /// The configured server URL cannot be turned into a WebSocket request.
    /// A setup defect, not a transient fault — never retried.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}
