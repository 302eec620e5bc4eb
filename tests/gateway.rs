//! Offline gateway behavior: connection guards and envelope handling.
//!
//! These tests run without a deployed backend. Where a server is needed,
//! a local one-shot responder plays the role and captures the request head
//! so the tests can assert on method, path, and query.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use token_discovery_client::prelude::*;

/// Accept one connection, read one full HTTP request, answer with `body`
/// as JSON, and return the request head for assertions.
async fn respond_once(listener: TcpListener, body: String) -> String {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    if name.eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
                return head;
            }
        }
    }
    panic!("request ended before headers were complete");
}

async fn local_responder(body: &str) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(respond_once(listener, body.to_string()));
    (format!("http://{}", addr), server)
}

// ─── Connection guards ───────────────────────────────────────────────────────

#[tokio::test]
async fn trigger_scan_requires_open_session() {
    let client = DiscoveryClient::builder()
        .base_url("http://127.0.0.1:1")
        .build();

    let err = client.trigger_scan(ScanOptions::default()).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::NotConnected), "got: {err:?}");
}

#[tokio::test]
async fn request_status_requires_open_session() {
    let client = DiscoveryClient::builder()
        .base_url("http://127.0.0.1:1")
        .build();

    let err = client.request_status().await.unwrap_err();
    assert!(matches!(err, DiscoveryError::NotConnected), "got: {err:?}");
}

#[tokio::test]
async fn get_stats_has_no_connection_guard() {
    // No session, so the request actually goes out and fails at the
    // transport layer instead of being rejected up front.
    let client = DiscoveryClient::builder()
        .base_url("http://127.0.0.1:1")
        .build();

    let err = client.get_stats().await.unwrap_err();
    assert!(
        matches!(err, DiscoveryError::Http(HttpError::Reqwest(_))),
        "got: {err:?}"
    );
}

// ─── Envelope handling ───────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_envelope_carries_server_message() {
    let (base_url, server) = local_responder(r#"{"success":false,"error":"scanner busy"}"#).await;

    let http = DiscoveryHttp::new(&base_url);
    let err = http.trigger_scan(20, None).await.unwrap_err();
    match err {
        HttpError::Rejected(message) => assert_eq!(message, "scanner busy"),
        other => panic!("expected Rejected, got: {other:?}"),
    }

    let head = server.await.unwrap();
    assert!(head.starts_with("POST /api/discovery/trigger"), "got: {head}");
}

#[tokio::test]
async fn status_envelope_unwraps_payload() {
    let (base_url, server) =
        local_responder(r#"{"success":true,"status":{"running":true,"active_scans":1}}"#).await;

    let http = DiscoveryHttp::new(&base_url);
    let status = http.get_status().await.unwrap();
    assert_eq!(status["running"], true);

    let head = server.await.unwrap();
    assert!(head.starts_with("GET /api/discovery/status"), "got: {head}");
}

#[tokio::test]
async fn recent_tokens_builds_query_and_parses() {
    let (base_url, server) =
        local_responder(r#"{"success":true,"tokens":[{"symbol":"MCAT","chain":"base"}]}"#).await;

    let http = DiscoveryHttp::new(&base_url);
    let tokens = http.get_recent(7, Some("base")).await.unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].label(), "MCAT");

    let head = server.await.unwrap();
    assert!(
        head.starts_with("GET /api/discovery/recent?limit=7&chain=base"),
        "got: {head}"
    );
}

#[tokio::test]
async fn recent_tokens_defaults_limit_to_50() {
    let (base_url, server) = local_responder(r#"{"success":true,"tokens":[]}"#).await;

    let client = DiscoveryClient::builder().base_url(&base_url).build();
    let tokens = client.recent_tokens(None, None).await.unwrap();
    assert!(tokens.is_empty());

    let head = server.await.unwrap();
    assert!(
        head.starts_with("GET /api/discovery/recent?limit=50"),
        "got: {head}"
    );
}
