//! Connection lifecycle state machine.
//!
//! Pure decision logic for the background connection task: which state the
//! connection is in, whether a failure earns another attempt, and how long
//! to wait before it. The task in `client` executes these decisions; nothing
//! here touches the network or the clock.

use std::time::Duration;

use crate::ws::WsConfig;

/// Connection state as observed through the client.
///
/// A pending reconnect timer is not a state of its own: the connection is
/// `Closed` while the timer runs, and re-enters `Connecting` when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Never connected.
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closed = 3,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// Outcome of asking the machine to schedule a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    /// Sleep for `delay`, then attempt to connect again.
    Retry { attempt: u32, delay: Duration },
    /// The attempt budget is spent. Emit one terminal error and stop.
    GiveUp { attempts: u32 },
}

/// The reconnect bookkeeping owned by one background connection task.
///
/// The attempt counter is seeded from the previous task's count when the
/// client reconnects manually, and resets only in [`Lifecycle::connected`].
/// A manual `connect()` after the terminal error therefore retries from a
/// spent budget instead of silently restarting it.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    auto_reconnect: bool,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    attempts: u32,
}

impl Lifecycle {
    pub(crate) fn new(config: &WsConfig, initial_attempts: u32) -> Self {
        Self {
            auto_reconnect: config.auto_reconnect,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
            attempts: initial_attempts,
        }
    }

    /// Turn off automatic reconnection for the rest of this task's life.
    pub(crate) fn disable_reconnect(&mut self) {
        self.auto_reconnect = false;
    }

    /// The transport reported an established connection.
    pub(crate) fn connected(&mut self) {
        self.attempts = 0;
    }

    /// Whether a failure should be retried at all.
    pub(crate) fn wants_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    /// Decide what to do after a failed attempt or an unexpected close.
    ///
    /// The counter is compared against the maximum before incrementing: with
    /// a maximum of N, the machine hands out N timers and turns the N+1th
    /// request into `GiveUp`.
    pub(crate) fn schedule_reconnect(&mut self) -> RetryDecision {
        if self.attempts >= self.max_reconnect_attempts {
            return RetryDecision::GiveUp {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        RetryDecision::Retry {
            attempt: self.attempts,
            delay: reconnect_delay(self.reconnect_delay, self.attempts),
        }
    }
}

/// Linear backoff capped at five times the base delay.
pub(crate) fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt.min(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> WsConfig {
        WsConfig {
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: max_attempts,
            ..Default::default()
        }
    }

    #[test]
    fn test_delay_sequence_is_linear_and_capped() {
        let base = Duration::from_millis(1000);
        let delays: Vec<u64> = (1..=6)
            .map(|attempt| reconnect_delay(base, attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 3000, 4000, 5000, 5000]);
    }

    #[test]
    fn test_counter_increments_before_delay() {
        let mut lifecycle = Lifecycle::new(&config(10), 0);
        match lifecycle.schedule_reconnect() {
            RetryDecision::Retry { attempt, delay } => {
                assert_eq!(attempt, 1);
                assert_eq!(delay, Duration::from_millis(1000));
            }
            other => panic!("expected Retry, got: {other:?}"),
        }
        match lifecycle.schedule_reconnect() {
            RetryDecision::Retry { attempt, delay } => {
                assert_eq!(attempt, 2);
                assert_eq!(delay, Duration::from_millis(2000));
            }
            other => panic!("expected Retry, got: {other:?}"),
        }
    }

    #[test]
    fn test_gives_up_after_budget_spent() {
        let mut lifecycle = Lifecycle::new(&config(2), 0);
        assert!(matches!(
            lifecycle.schedule_reconnect(),
            RetryDecision::Retry { attempt: 1, .. }
        ));
        assert!(matches!(
            lifecycle.schedule_reconnect(),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert_eq!(
            lifecycle.schedule_reconnect(),
            RetryDecision::GiveUp { attempts: 2 }
        );
        // Still spent on the next ask.
        assert_eq!(
            lifecycle.schedule_reconnect(),
            RetryDecision::GiveUp { attempts: 2 }
        );
    }

    #[test]
    fn test_success_resets_counter() {
        let mut lifecycle = Lifecycle::new(&config(10), 0);
        lifecycle.schedule_reconnect();
        lifecycle.schedule_reconnect();

        lifecycle.connected();
        assert!(matches!(
            lifecycle.schedule_reconnect(),
            RetryDecision::Retry { attempt: 1, .. }
        ));
    }

    #[test]
    fn test_manual_reconnect_keeps_spent_budget() {
        // A new task seeded with a spent counter goes straight to GiveUp.
        let mut lifecycle = Lifecycle::new(&config(2), 2);
        assert_eq!(
            lifecycle.schedule_reconnect(),
            RetryDecision::GiveUp { attempts: 2 }
        );
    }

    #[test]
    fn test_disable_reconnect() {
        let mut lifecycle = Lifecycle::new(&config(10), 0);
        assert!(lifecycle.wants_reconnect());
        lifecycle.disable_reconnect();
        assert!(!lifecycle.wants_reconnect());
    }

    #[test]
    fn test_connection_state_from_u8() {
        assert_eq!(ConnectionState::from(0), ConnectionState::Idle);
        assert_eq!(ConnectionState::from(2), ConnectionState::Open);
        assert_eq!(ConnectionState::from(42), ConnectionState::Closed);
    }
}
