//! Realtime connection driver — `tokio-tungstenite`.
//!
//! A background tokio task owns the WebSocket stream, the reconnect timer,
//! and the lifecycle machine; the public [`WsClient`] talks to it over a
//! command channel. Events fan out through the shared [`EventDispatcher`],
//! guarded by a generation counter: `disconnect()` retires the task's
//! generation, so a transport callback resolving afterwards dispatches
//! nothing.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::WsError;
use crate::stats::SharedStats;
use crate::ws::dispatcher::EventDispatcher;
use crate::ws::lifecycle::{ConnectionState, Lifecycle, RetryDecision};
use crate::ws::{DiscoveryEvent, Kind, MessageIn, MessageOut, WsConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Disconnect,
}

// ─── State shared between WsClient and the background task ───────────────────

struct Shared {
    state: AtomicU8,
    generation: AtomicU64,
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: WsConfig,
    lifecycle: Lifecycle,
    dispatcher: Arc<EventDispatcher>,
    stats: SharedStats,
    cmd_rx: mpsc::Receiver<Command>,
    generation: u64,
    shared: Arc<Shared>,
}

impl TaskState {
    fn is_live(&self) -> bool {
        self.shared.generation.load(Ordering::SeqCst) == self.generation
    }

    /// Dispatch unless `disconnect()` has retired this task's generation.
    fn emit(&self, event: DiscoveryEvent) {
        if self.is_live() {
            self.dispatcher.dispatch(&event);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        if self.is_live() {
            self.shared.state.store(state as u8, Ordering::SeqCst);
        }
    }
}

// ─── Public WsClient ─────────────────────────────────────────────────────────

/// Owner of the single realtime session and its reconnect loop.
///
/// Constructed by [`DiscoveryClient`](crate::client::DiscoveryClient), which
/// wires in the shared dispatcher and stats.
pub struct WsClient {
    config: WsConfig,
    dispatcher: Arc<EventDispatcher>,
    stats: SharedStats,
    shared: Arc<Shared>,
    cmd_tx: Option<mpsc::Sender<Command>>,
    task_handle: Option<JoinHandle<()>>,
    reconnect_disabled: bool,
}

impl WsClient {
    pub(crate) fn new(config: WsConfig, dispatcher: Arc<EventDispatcher>, stats: SharedStats) -> Self {
        Self {
            config,
            dispatcher,
            stats,
            shared: Arc::new(Shared {
                state: AtomicU8::new(ConnectionState::Idle as u8),
                generation: AtomicU64::new(0),
            }),
            cmd_tx: None,
            task_handle: None,
            reconnect_disabled: false,
        }
    }

    /// Start the connection. A no-op while a session is open, connecting,
    /// or waiting out a reconnect timer.
    ///
    /// Connection failures are not returned here; they surface through the
    /// `Error` event channel, where the reconnect loop also reports.
    pub async fn connect(&mut self) {
        if self.task_alive() {
            tracing::warn!("Already connected to the discovery service");
            return;
        }

        // A URL that cannot become a WebSocket request is a setup defect,
        // not a transient fault. Surface it once and schedule nothing.
        if let Err(e) = self.config.url.as_str().into_client_request() {
            let err = WsError::InvalidUrl(e.to_string());
            tracing::error!("{}", err);
            self.dispatcher.dispatch(&DiscoveryEvent::Error {
                message: err.to_string(),
                attempts: None,
            });
            return;
        }

        tracing::info!("Connecting to discovery service at {}", self.config.url);

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        self.cmd_tx = Some(cmd_tx);
        self.shared
            .state
            .store(ConnectionState::Connecting as u8, Ordering::SeqCst);

        // The attempt counter carries over from the previous task: only a
        // successful connection resets it.
        let mut lifecycle = Lifecycle::new(&self.config, self.stats.reconnect_attempts());
        if self.reconnect_disabled {
            lifecycle.disable_reconnect();
        }

        let state = TaskState {
            config: self.config.clone(),
            lifecycle,
            dispatcher: Arc::clone(&self.dispatcher),
            stats: Arc::clone(&self.stats),
            cmd_rx,
            generation: self.shared.generation.load(Ordering::SeqCst),
            shared: Arc::clone(&self.shared),
        };

        self.task_handle = Some(tokio::spawn(run_task(state)));
    }

    /// Tear the connection down and permanently disable auto-reconnect for
    /// this instance. Cancels a pending reconnect timer. Idempotent.
    ///
    /// After this returns, no further events fire, even if an in-flight
    /// connection attempt resolves later.
    pub async fn disconnect(&mut self) {
        // Retire the current generation first so a racing transport
        // callback dispatches nothing.
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared
            .state
            .store(ConnectionState::Closed as u8, Ordering::SeqCst);
        self.reconnect_disabled = true;
        self.stats.clear_connected_at();

        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Disconnect).await;
        }
        if let Some(mut handle) = self.task_handle.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.shared.state.load(Ordering::SeqCst))
    }

    /// Whether the realtime session is currently open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    fn task_alive(&self) -> bool {
        matches!(&self.task_handle, Some(handle) if !handle.is_finished())
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) {
    run_loop(&mut state).await;
    state.set_state(ConnectionState::Closed);
}

async fn run_loop(state: &mut TaskState) {
    loop {
        state.set_state(ConnectionState::Connecting);

        // ── 1. Attempt connection, abortable by disconnect ───────────────
        let result = tokio::select! {
            biased;
            _ = state.cmd_rx.recv() => return,
            result = attempt_connect(&state.config.url) => result,
        };

        let (mut sink, stream) = match result {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("{}", e);
                state.set_state(ConnectionState::Closed);
                state.emit(DiscoveryEvent::Error {
                    message: e.to_string(),
                    attempts: None,
                });
                if retry_or_give_up(state).await {
                    continue;
                }
                return;
            }
        };

        // ── 2. Connected ─────────────────────────────────────────────────
        state.lifecycle.connected();
        let connected_at = Utc::now();
        state.stats.record_connected(connected_at);
        state.set_state(ConnectionState::Open);

        let session_id = new_session_id();
        tracing::info!(session_id = %session_id, "Connected to discovery service");
        state.emit(DiscoveryEvent::Connected {
            connected_at,
            session_id,
        });

        // ── 3. Join the shared channel, ask for a status snapshot ────────
        for msg in [MessageOut::JoinDiscovery, MessageOut::RequestStatus] {
            if let Err(e) = send_msg(&mut sink, &msg).await {
                tracing::warn!("Control message failed: {}", e);
            }
        }

        // ── 4. Pump until the connection breaks ──────────────────────────
        let reason = run_connected(state, sink, stream).await;
        state.set_state(ConnectionState::Closed);

        match reason {
            DisconnectReason::UserRequested => return,
            DisconnectReason::Remote(reason) => {
                tracing::info!("Disconnected: {}", reason);
                state.emit(DiscoveryEvent::Disconnected { reason });
                if retry_or_give_up(state).await {
                    continue;
                }
                return;
            }
        }
    }
}

enum DisconnectReason {
    UserRequested,
    Remote(String),
}

/// The inner connected loop — runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
) -> DisconnectReason {
    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => handle_text(state, text.as_ref()),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return DisconnectReason::Remote(close_reason(frame.as_ref()));
                    }
                    Some(Ok(_)) => {} // Binary, Pong, Frame — ignore
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        return DisconnectReason::Remote(e.to_string());
                    }
                    None => {
                        return DisconnectReason::Remote("Stream ended".into());
                    }
                }
            }

            cmd = state.cmd_rx.recv() => {
                // Disconnect command, or WsClient dropped — either way done.
                let _ = cmd;
                let _ = sink.send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "Client disconnect".into(),
                }))).await;
                return DisconnectReason::UserRequested;
            }
        }
    }
}

fn handle_text(state: &TaskState, text: &str) {
    if !state.is_live() {
        return;
    }

    match serde_json::from_str::<MessageIn>(text) {
        Ok(msg) => match msg.kind {
            Kind::NewToken(token) => {
                tracing::debug!("New token: {}", token.label());
                state.stats.record_token();
                state.emit(DiscoveryEvent::NewToken(token));
            }
            Kind::ScanStarted(started) => state.emit(DiscoveryEvent::ScanStarted(started)),
            Kind::ScanCompleted(summary) => {
                state.stats.record_scan();
                state.emit(DiscoveryEvent::ScanCompleted(summary));
            }
            Kind::ScanError(err) => state.emit(DiscoveryEvent::ScanError(err)),
            Kind::Status(status) => state.emit(DiscoveryEvent::Status(status)),
            Kind::JoinedDiscovery(ack) => {
                tracing::info!("Joined discovery channel: {}", ack.message);
            }
        },
        Err(e) => {
            tracing::warn!("WS deserialization error: {} — raw: {}", e, text);
            state.emit(DiscoveryEvent::Error {
                message: format!("Deserialization error: {}", e),
                attempts: None,
            });
        }
    }
}

/// Decide whether to go around the connect loop again.
///
/// Returns `true` after sleeping out a backoff delay; `false` when
/// reconnection is disabled, the budget is spent, or a disconnect command
/// cancelled the pending timer.
async fn retry_or_give_up(state: &mut TaskState) -> bool {
    if !state.lifecycle.wants_reconnect() {
        return false;
    }

    match state.lifecycle.schedule_reconnect() {
        RetryDecision::GiveUp { attempts } => {
            tracing::error!("Max reconnect attempts reached ({})", attempts);
            state.stats.set_reconnect_attempts(attempts);
            state.emit(DiscoveryEvent::Error {
                message: "Max reconnect attempts reached".into(),
                attempts: Some(attempts),
            });
            false
        }
        RetryDecision::Retry { attempt, delay } => {
            state.stats.set_reconnect_attempts(attempt);
            tracing::info!(
                "Reconnect attempt {}/{} in {}ms",
                attempt,
                state.config.max_reconnect_attempts,
                delay.as_millis()
            );
            tokio::select! {
                biased;
                _ = state.cmd_rx.recv() => false,
                () = tokio::time::sleep(delay) => true,
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Attempt to establish a WebSocket connection with a 30-second timeout.
async fn attempt_connect(
    url: &str,
) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>), WsError> {
    let (ws_stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url))
        .await
        .map_err(|_| WsError::ConnectionFailed("Connection timeout".into()))?
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    Ok(ws_stream.split())
}

/// Serialize and send a MessageOut over the sink.
async fn send_msg(
    sink: &mut SplitSink<WsStream, Message>,
    msg: &MessageOut,
) -> Result<(), WsError> {
    let json = serde_json::to_string(msg).map_err(|e| WsError::SendFailed(e.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

fn close_reason(frame: Option<&CloseFrame>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => frame.reason.to_string(),
        Some(frame) => format!("Close code {}", u16::from(frame.code)),
        None => "Connection closed".into(),
    }
}

fn new_session_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsInner;

    fn test_client(config: WsConfig) -> WsClient {
        WsClient::new(
            config,
            Arc::new(EventDispatcher::new()),
            Arc::new(StatsInner::default()),
        )
    }

    #[test]
    fn test_new_client_is_idle() {
        let client = test_client(WsConfig::default());
        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(!client.is_connected());
        assert!(client.cmd_tx.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_when_not_connected() {
        let mut client = test_client(WsConfig::default());
        client.disconnect().await;
        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_invalid_url_emits_error_without_spawning() {
        use crate::ws::EventKind;
        use std::sync::atomic::AtomicUsize;

        let dispatcher = Arc::new(EventDispatcher::new());
        let errors = Arc::new(AtomicUsize::new(0));
        {
            let errors = Arc::clone(&errors);
            dispatcher.on(EventKind::Error, move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            });
        }

        let config = WsConfig {
            url: "not a url".into(),
            ..Default::default()
        };
        let mut client = WsClient::new(config, dispatcher, Arc::new(StatsInner::default()));
        client.connect().await;

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(client.task_handle.is_none());
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_close_reason() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "goodbye".into(),
        };
        assert_eq!(close_reason(Some(&frame)), "goodbye");

        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "".into(),
        };
        assert_eq!(close_reason(Some(&frame)), "Close code 1001");

        assert_eq!(close_reason(None), "Connection closed");
    }

    #[test]
    fn test_session_ids_are_distinct() {
        let a = new_session_id();
        let b = new_session_id();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }
}
