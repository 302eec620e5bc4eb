//! Network URL constants for the discovery client.

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.tokenscanner.pro";

/// Default WebSocket URL.
pub const DEFAULT_WS_URL: &str = "wss://api.tokenscanner.pro/ws";
