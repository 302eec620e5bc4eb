//! Realtime layer — wire messages, events, configuration.
//!
//! The transport is JSON text frames over WebSocket, discriminated by a
//! `"type"` tag in both directions. `client` owns the connection and its
//! reconnect loop, `lifecycle` is the pure state machine behind it, and
//! `dispatcher` fans events out to registered callbacks.

pub mod client;
pub mod dispatcher;
pub mod lifecycle;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::token::TokenRecord;

pub use client::WsClient;
pub use dispatcher::{EventDispatcher, SubscriptionHandle};
pub use lifecycle::ConnectionState;

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Control messages sent from client to server.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum MessageOut {
    /// Join the shared discovery broadcast channel.
    #[serde(rename = "join_discovery")]
    JoinDiscovery,
    /// Ask the server to push a current status snapshot.
    #[serde(rename = "request_status")]
    RequestStatus,
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// Raw inbound message from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageIn {
    #[serde(flatten)]
    pub kind: Kind,
}

/// The type of inbound WebSocket message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Kind {
    #[serde(rename = "new_token")]
    NewToken(TokenRecord),
    #[serde(rename = "scan_started")]
    ScanStarted(ScanStarted),
    #[serde(rename = "scan_completed")]
    ScanCompleted(ScanSummary),
    #[serde(rename = "scan_error")]
    ScanError(ScanError),
    #[serde(rename = "discovery_status")]
    Status(ServiceStatus),
    #[serde(rename = "joined_discovery")]
    JoinedDiscovery(JoinAck),
}

/// Echo of the parameters a scan was started with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanStarted {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Summary counts for a finished scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_found: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A scan that failed server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanError {
    pub error: String,
}

/// Service status snapshot. Opaque to this layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceStatus {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Ack for the join control message. Logged, not dispatched.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinAck {
    #[serde(default)]
    pub message: String,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// High-level events delivered to subscribers.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Connection established.
    Connected {
        connected_at: DateTime<Utc>,
        session_id: String,
    },
    /// Connection lost (may trigger a reconnect).
    Disconnected { reason: String },
    /// A token was discovered and pushed by the server.
    NewToken(TokenRecord),
    ScanStarted(ScanStarted),
    ScanCompleted(ScanSummary),
    ScanError(ScanError),
    /// Service status snapshot (pushed after `request_status`).
    Status(ServiceStatus),
    /// A connection or protocol error. `attempts` is set on the terminal
    /// max-reconnect-attempts error.
    Error {
        message: String,
        attempts: Option<u32>,
    },
}

impl DiscoveryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DiscoveryEvent::Connected { .. } => EventKind::Connected,
            DiscoveryEvent::Disconnected { .. } => EventKind::Disconnected,
            DiscoveryEvent::NewToken(_) => EventKind::NewToken,
            DiscoveryEvent::ScanStarted(_) => EventKind::ScanStarted,
            DiscoveryEvent::ScanCompleted(_) => EventKind::ScanCompleted,
            DiscoveryEvent::ScanError(_) => EventKind::ScanError,
            DiscoveryEvent::Status(_) => EventKind::Status,
            DiscoveryEvent::Error { .. } => EventKind::Error,
        }
    }
}

/// The closed set of subscribable event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    NewToken,
    ScanStarted,
    ScanCompleted,
    ScanError,
    Status,
    Error,
}

impl EventKind {
    pub(crate) const COUNT: usize = 8;

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Configuration for the realtime connection. Immutable after construction;
/// build a new client to change it.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub auto_reconnect: bool,
    /// Base reconnect delay in milliseconds. The actual delay grows linearly
    /// with the attempt number, capped at five times this value.
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_WS_URL.to_string(),
            auto_reconnect: true,
            reconnect_delay_ms: 3000,
            max_reconnect_attempts: 10,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
