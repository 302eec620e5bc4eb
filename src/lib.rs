//! # Token Discovery Client
//!
//! Rust client for the Token Scanner discovery service: a persistent
//! realtime channel for token pushes, plus stateless REST calls.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core** — error taxonomy, URL constants, token records
//! 2. **Realtime** — wire messages, the connection lifecycle machine, the
//!    event dispatcher, and the `tokio-tungstenite` driver
//! 3. **REST gateway** — `DiscoveryHttp`, single-shot calls
//! 4. **High-Level Client** — `DiscoveryClient` with builder and stats
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use token_discovery_client::prelude::*;
//!
//! let mut client = DiscoveryClient::builder()
//!     .base_url("https://scanner.example.com")
//!     .build();
//!
//! client.on(EventKind::NewToken, |event| {
//!     if let DiscoveryEvent::NewToken(token) = event {
//!         println!("discovered: {}", token.label());
//!     }
//! });
//!
//! client.connect().await;
//! let recent = client.recent_tokens(None, Some("ethereum")).await?;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Unified client error types.
pub mod error;

/// Network URL constants.
pub mod network;

/// Discovered token records.
pub mod token;

/// Read-only client statistics.
pub mod stats;

// ── Layer 2: Realtime ────────────────────────────────────────────────────────

/// Realtime connection: wire messages, lifecycle, dispatcher, driver.
pub mod ws;

// ── Layer 3: REST gateway ────────────────────────────────────────────────────

/// REST gateway for scan/status/stats/recent calls.
pub mod http;

// ── Layer 4: High-Level Client ───────────────────────────────────────────────

/// `DiscoveryClient` — the primary entry point.
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    pub use crate::client::{DiscoveryClient, DiscoveryClientBuilder, ScanOptions};
    pub use crate::error::{DiscoveryError, HttpError, WsError};
    pub use crate::http::wire::TriggerScanResponse;
    pub use crate::http::DiscoveryHttp;
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_WS_URL};
    pub use crate::stats::ClientStats;
    pub use crate::token::TokenRecord;
    pub use crate::ws::{
        ConnectionState, DiscoveryEvent, EventKind, Kind, MessageIn, MessageOut, ScanError,
        ScanStarted, ScanSummary, ServiceStatus, SubscriptionHandle, WsConfig,
    };
}
