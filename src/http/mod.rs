//! REST gateway — single-shot request/response helpers.
//!
//! Independent of the realtime connection; shares only the base URL. The
//! gateway never retries — retries are the caller's responsibility, unlike
//! the reconnect loop in `ws`.

pub mod client;
pub mod wire;

pub use client::DiscoveryHttp;
