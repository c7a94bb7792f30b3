//! UI-side core of the zerotrace browser assistant.
//!
//! ## Relay bootstrap
//!
//! Every backend call leaves this crate through a [`relay_protocol::RelayChannel`].
//! The terminal driver attaches `relay_background::RelayHandle`; tests attach
//! `relay_mock::ScriptedRelay`. With no channel attached, or with
//! `ZEROTRACE_DEMO=1`, [`ActionClient`] answers every capability locally.
//!
//! Environment:
//!
//! - `ZEROTRACE_BACKEND_URL` backend base address (default `http://localhost:3000`)
//! - `ZEROTRACE_MODEL` chat model (default `gpt-3.5-turbo`)
//! - `ZEROTRACE_CREDITS` starting credit balance (default 100)
//! - `ZEROTRACE_SEARCH_STREAM=1` streams web search results
//! - `ZEROTRACE_RELAY_TIMEOUT_SEC` per-request timeout, unset or 0 for none
//! - `ZEROTRACE_CONTEXT_FILE` page text attached to chat turns
//!
//! Transcript contract: one user message plus one assistant placeholder per
//! accepted action; the placeholder is sealed exactly once when the action
//! settles, and credits move only after a success.

pub mod capability;
pub mod client;
pub mod commands;
pub mod config;
pub mod context;
pub mod credits;
pub mod format;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod transcript;
pub mod url;

pub use capability::Capability;
pub use client::{ActionClient, ActionError, ActionErrorKind, AssistantMode, ClientSettings};
pub use config::{AssistantConfig, ConfigError};
pub use context::{ContextSource, FileContextSource, PageContext};
pub use credits::CreditLedger;
pub use orchestrator::{Action, ActionOutcome, IgnoreReason, Orchestrator, Phase, TranscriptEvent};
pub use transcript::{Message, MessageId, MessageKind, Role, Transcript, TranscriptError};
