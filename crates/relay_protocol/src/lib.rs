//! Minimal contract for relaying HTTP requests across a privilege boundary.
//!
//! An unprivileged UI context cannot issue cross-origin fetches itself. It hands a
//! [`RelayRequest`] to a [`RelayChannel`], and a privileged background context
//! performs the exchange and answers through a [`RelaySender`]. The caller
//! observes the answer through the paired [`RelayReply`].
//!
//! Every request resolves with exactly one terminal [`RelayEvent`]:
//! `Done` after zero or more `Chunk`s, an atomic `Success`, or a `Failure`.
//! Terminal calls consume the sender, and a sender dropped without a terminal
//! outcome surfaces as one transport failure on the reply side.
//!
//! This crate defines only value types, the reply pair, and wire envelopes. It
//! excludes HTTP transport details and any caller-side orchestration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod reply;
pub mod wire;

pub use reply::{reply_pair, RelayReply, RelaySender, CLOSED_WITHOUT_OUTCOME, REPLY_CHUNK_CAPACITY};

/// Identifier for one relayed request, assigned by the background context.
pub type RequestId = u64;

/// HTTP method carried by a relay request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch options forwarded verbatim to the background context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// One "perform HTTP request" instruction. Sent once per action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub url: String,
    pub options: RequestOptions,
    /// When true the body is forwarded as chunks instead of one JSON payload.
    pub stream: bool,
}

impl RelayRequest {
    /// Builds a `POST` request carrying `body` as JSON.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: &Value, stream: bool) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            url: url.into(),
            options: RequestOptions {
                method: HttpMethod::Post,
                headers,
                body: Some(body.to_string()),
            },
            stream,
        }
    }
}

/// Origin of a relay failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The background context or the network could not be reached.
    Transport,
    /// The backend answered, but with an error.
    Upstream,
}

/// Event delivered to the caller of a relayed request, in production order.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Chunk(Vec<u8>),
    Done,
    Success(Value),
    Failure { kind: FailureKind, message: String },
}

impl RelayEvent {
    /// Returns true when this event terminates the request lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk(_))
    }
}

/// Caller-facing error for a relayed request that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("relay transport failure: {0}")]
    Transport(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("unexpected relay reply: {0}")]
    UnexpectedReply(String),
}

impl RelayError {
    /// Returns the underlying error message without the category prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Transport(message) | Self::Upstream(message) | Self::UnexpectedReply(message) => {
                message
            }
        }
    }

    #[must_use]
    pub fn from_failure(kind: FailureKind, message: String) -> Self {
        match kind {
            FailureKind::Transport => Self::Transport(message),
            FailureKind::Upstream => Self::Upstream(message),
        }
    }
}

/// Bridge from the UI context to a privileged context able to perform requests.
pub trait RelayChannel: Send + Sync + 'static {
    /// Reports whether a privileged context is attached to this channel.
    ///
    /// Callers use this to decide between the relay and a local fallback.
    fn is_available(&self) -> bool {
        true
    }

    /// Hands `request` to the privileged context and returns its reply stream.
    ///
    /// Implementations must resolve the returned reply with exactly one
    /// terminal event, including when the privileged context is unreachable.
    fn dispatch(&self, request: RelayRequest) -> RelayReply;
}
