//! Read-only client-side statistics.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// Snapshot of the client's counters, as returned by
/// [`DiscoveryClient::client_stats`](crate::client::DiscoveryClient::client_stats).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientStats {
    pub connected: bool,
    /// Tokens received over the realtime channel since construction.
    pub tokens_received: u64,
    /// Completed scans observed since construction.
    pub scans_completed: u64,
    /// Current reconnect attempt count. Resets to 0 on a successful
    /// connection, never on a manual reconnect.
    pub reconnect_attempts: u32,
    pub connected_at: Option<DateTime<Utc>>,
    /// Milliseconds since the connection was established; 0 when there is
    /// no connection timestamp.
    pub uptime_ms: i64,
}

/// Counters shared between the client and its background connection task.
#[derive(Debug, Default)]
pub(crate) struct StatsInner {
    tokens_received: AtomicU64,
    scans_completed: AtomicU64,
    reconnect_attempts: AtomicU32,
    connected_at: Mutex<Option<DateTime<Utc>>>,
}

pub(crate) type SharedStats = Arc<StatsInner>;

impl StatsInner {
    pub(crate) fn record_token(&self) {
        self.tokens_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan(&self) {
        self.scans_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connected(&self, at: DateTime<Utc>) {
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        *self.connected_at.lock().unwrap() = Some(at);
    }

    /// Clears the connection timestamp. Called on intentional disconnect
    /// only; an unexpected drop keeps the timestamp until the session is
    /// re-established or torn down.
    pub(crate) fn clear_connected_at(&self) {
        *self.connected_at.lock().unwrap() = None;
    }

    pub(crate) fn set_reconnect_attempts(&self, attempts: u32) {
        self.reconnect_attempts.store(attempts, Ordering::SeqCst);
    }

    pub(crate) fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot(&self, connected: bool, now: DateTime<Utc>) -> ClientStats {
        let connected_at = *self.connected_at.lock().unwrap();
        ClientStats {
            connected,
            tokens_received: self.tokens_received.load(Ordering::Relaxed),
            scans_completed: self.scans_completed.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts(),
            connected_at,
            uptime_ms: connected_at
                .map(|at| (now - at).num_milliseconds())
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_counters_accumulate() {
        let stats = StatsInner::default();
        stats.record_token();
        stats.record_token();
        stats.record_scan();

        let snapshot = stats.snapshot(true, Utc::now());
        assert_eq!(snapshot.tokens_received, 2);
        assert_eq!(snapshot.scans_completed, 1);
    }

    #[test]
    fn test_connected_resets_attempts_and_stamps_time() {
        let stats = StatsInner::default();
        stats.set_reconnect_attempts(4);

        let at = Utc::now();
        stats.record_connected(at);

        let snapshot = stats.snapshot(true, at + ChronoDuration::milliseconds(2500));
        assert_eq!(snapshot.reconnect_attempts, 0);
        assert_eq!(snapshot.connected_at, Some(at));
        assert_eq!(snapshot.uptime_ms, 2500);
    }

    #[test]
    fn test_uptime_zero_without_timestamp() {
        let stats = StatsInner::default();
        let snapshot = stats.snapshot(false, Utc::now());
        assert_eq!(snapshot.uptime_ms, 0);
        assert_eq!(snapshot.connected_at, None);
    }
}
