//! Privileged side of the request relay.
//!
//! The background context owns the HTTP client. It accepts
//! [`relay_protocol::RelayRequest`]s through a [`RelayHandle`], performs each one
//! on its own task, and answers through the request's reply pair: one JSON
//! payload for atomic exchanges, or body chunks forwarded by the [`pump`]
//! followed by `done` for streaming ones.
//!
//! No retries are attempted. Every failure is reported once and is terminal
//! for that request.

pub mod config;
pub mod error;
pub mod fetch;
pub mod pump;
pub mod service;

pub use config::BackgroundConfig;
pub use error::{parse_error_message, FetchError};
pub use fetch::Fetcher;
pub use pump::{pump, PumpSummary};
pub use service::{BackgroundRelay, RelayHandle, ERROR_SERVICE_STOPPED};
