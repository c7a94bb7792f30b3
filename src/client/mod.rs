//! Typed client for the backend capabilities.
//!
//! Every method builds the capability's request body, hands it to the relay
//! and decodes the reply. When no privileged context is attached the client
//! answers locally with canned demo results instead.

mod decode;
mod demo;

use std::fmt;
use std::sync::Arc;

use relay_protocol::{RelayChannel, RelayError, RelayReply, RelayRequest};
use serde::Serialize;
use serde_json::{json, Value};

use crate::capability::Capability;
use crate::context::PageContext;
use crate::models::{ComplexityAnalysis, DsaProblem, DsaSolution, FileAnalysis, TestCase, UploadedFile};
use crate::url::{endpoint, DEFAULT_BACKEND_URL};

pub use decode::Utf8ChunkDecoder;
pub use demo::DEMO_IMAGE_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionErrorKind {
    /// The relay or the network failed before the backend answered.
    Transport,
    /// The backend answered with an error.
    Upstream,
    /// The backend answered with a payload of the wrong shape.
    Decode,
}

impl fmt::Display for ActionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport",
            Self::Upstream => "upstream",
            Self::Decode => "decode",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{capability} failed ({kind}): {message}")]
pub struct ActionError {
    pub capability: Capability,
    pub kind: ActionErrorKind,
    pub message: String,
}

impl ActionError {
    pub fn new(capability: Capability, kind: ActionErrorKind, message: impl Into<String>) -> Self {
        Self {
            capability,
            kind,
            message: message.into(),
        }
    }

    pub fn from_relay(capability: Capability, error: RelayError) -> Self {
        let kind = match &error {
            RelayError::Transport(_) => ActionErrorKind::Transport,
            RelayError::Upstream(_) => ActionErrorKind::Upstream,
            RelayError::UnexpectedReply(_) => ActionErrorKind::Decode,
        };
        Self::new(capability, kind, error.message())
    }

    fn decode(capability: Capability, error: impl fmt::Display) -> Self {
        Self::new(capability, ActionErrorKind::Decode, error.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssistantMode {
    #[default]
    Chat,
    DsaSolver,
}

impl AssistantMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::DsaSolver => "dsa-solver",
        }
    }
}

/// One prior turn as the chat capability expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Inputs for one chat turn. `history` ends with the new user message.
#[derive(Debug, Clone, Copy)]
pub struct ChatTurn<'a> {
    pub history: &'a [ChatMessage],
    pub model: &'a str,
    pub mode: AssistantMode,
    pub context: &'a PageContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Requests web search results as a stream instead of one payload.
    pub stream_search: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            temperature: crate::config::DEFAULT_TEMPERATURE,
            max_tokens: crate::config::DEFAULT_MAX_TOKENS,
            stream_search: false,
        }
    }
}

pub struct ActionClient {
    relay: Option<Arc<dyn RelayChannel>>,
    settings: ClientSettings,
}

impl fmt::Debug for ActionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionClient")
            .field("relay_attached", &self.relay.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl ActionClient {
    pub fn new(relay: Option<Arc<dyn RelayChannel>>, settings: ClientSettings) -> Self {
        Self { relay, settings }
    }

    /// Client that never touches the relay.
    pub fn demo(settings: ClientSettings) -> Self {
        Self::new(None, settings)
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// True when calls are answered locally.
    pub fn is_demo(&self) -> bool {
        self.live_relay().is_none()
    }

    pub fn endpoint(&self, capability: Capability) -> String {
        endpoint(&self.settings.base_url, capability.path())
    }

    /// Streams the assistant reply to `sink` segment by segment.
    pub async fn send_chat<F>(&self, turn: ChatTurn<'_>, mut sink: F) -> Result<(), ActionError>
    where
        F: FnMut(&str),
    {
        let capability = Capability::ChatTurn;
        let body = json!({
            "messages": turn.history,
            "model": turn.model,
            "temperature": self.settings.temperature,
            "maxTokens": self.settings.max_tokens,
            "mode": turn.mode.as_str(),
            "context": turn.context,
        });

        let Some(reply) = self.dispatch(capability, &body) else {
            let prompt = turn
                .history
                .iter()
                .rev()
                .find(|message| message.role == "user")
                .map(|message| message.content.as_str())
                .unwrap_or_default();
            for chunk in demo::word_chunks(&demo::chat_reply(prompt)) {
                sink(&chunk);
                tokio::task::yield_now().await;
            }
            return Ok(());
        };

        stream_text(capability, reply, &mut sink).await
    }

    /// Delivers the search summary to `sink`, incrementally when search streaming is enabled.
    pub async fn web_search<F>(&self, query: &str, mut sink: F) -> Result<(), ActionError>
    where
        F: FnMut(&str),
    {
        let capability = Capability::WebSearch;
        let body = json!({ "query": query });

        let Some(reply) = self.dispatch(capability, &body) else {
            sink(&demo::search_summary(query));
            return Ok(());
        };

        if capability.streams(self.settings.stream_search) {
            return stream_text(capability, reply, &mut sink).await;
        }

        let data = resolve(capability, reply).await?;
        let summary = decode::text_field(&data, decode::TEXT_KEYS)
            .ok_or_else(|| ActionError::decode(capability, "response carried no search summary"))?;
        sink(&summary);
        Ok(())
    }

    pub async fn call_function(&self, name: &str, arguments: &Value) -> Result<String, ActionError> {
        let capability = Capability::FunctionCall;
        let body = json!({ "functionName": name, "arguments": arguments });

        let Some(reply) = self.dispatch(capability, &body) else {
            return Ok(demo::function_result(name, arguments));
        };

        let data = resolve(capability, reply).await?;
        Ok(decode::text_field(&data, decode::TEXT_KEYS).unwrap_or_else(|| {
            serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string())
        }))
    }

    /// Returns the generated image's URL.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ActionError> {
        let capability = Capability::ImageGeneration;
        let body = json!({ "prompt": prompt });

        let Some(reply) = self.dispatch(capability, &body) else {
            return Ok(DEMO_IMAGE_URL.to_string());
        };

        let data = resolve(capability, reply).await?;
        decode::text_field(&data, decode::IMAGE_URL_KEYS)
            .ok_or_else(|| ActionError::decode(capability, "response carried no image URL"))
    }

    pub async fn solve_problem(
        &self,
        problem: &DsaProblem,
        language: &str,
    ) -> Result<DsaSolution, ActionError> {
        let capability = Capability::ProblemSolve;
        let body = json!({ "problem": problem, "language": language });

        let Some(reply) = self.dispatch(capability, &body) else {
            return Ok(demo::solution(problem, language));
        };

        let data = resolve(capability, reply).await?;
        let mut solution: DsaSolution =
            decode::typed(data, "solution").map_err(|error| ActionError::decode(capability, error))?;
        if solution.language.is_empty() {
            solution.language = language.to_string();
        }
        Ok(solution)
    }

    pub async fn analyze_complexity(
        &self,
        code: &str,
        language: &str,
    ) -> Result<ComplexityAnalysis, ActionError> {
        let capability = Capability::ComplexityAnalysis;
        let body = json!({ "code": code, "language": language });

        let Some(reply) = self.dispatch(capability, &body) else {
            return Ok(demo::complexity());
        };

        let data = resolve(capability, reply).await?;
        decode::typed(data, "analysis").map_err(|error| ActionError::decode(capability, error))
    }

    pub async fn generate_test_cases(
        &self,
        description: &str,
        count: u32,
    ) -> Result<Vec<TestCase>, ActionError> {
        let capability = Capability::TestCaseGeneration;
        let body = json!({ "description": description, "count": count });

        let Some(reply) = self.dispatch(capability, &body) else {
            return Ok(demo::test_cases(description, count));
        };

        let data = resolve(capability, reply).await?;
        decode::typed(data, "testCases").map_err(|error| ActionError::decode(capability, error))
    }

    pub async fn analyze_file(&self, file: &UploadedFile) -> Result<FileAnalysis, ActionError> {
        let capability = Capability::FileAnalysis;
        let body = json!({ "file": file });

        let Some(reply) = self.dispatch(capability, &body) else {
            return Ok(demo::file_analysis(file));
        };

        let data = resolve(capability, reply).await?;
        let summary = decode::text_field(&data, &["summary", "analysis", "description"])
            .or_else(|| decode::text_field(&data, decode::TEXT_KEYS))
            .ok_or_else(|| ActionError::decode(capability, "response carried no analysis summary"))?;
        Ok(FileAnalysis {
            summary,
            details: data,
        })
    }

    fn live_relay(&self) -> Option<&Arc<dyn RelayChannel>> {
        self.relay.as_ref().filter(|relay| relay.is_available())
    }

    fn dispatch(&self, capability: Capability, body: &Value) -> Option<RelayReply> {
        let Some(relay) = self.live_relay() else {
            tracing::debug!(capability = capability.name(), "no relay attached; answering locally");
            return None;
        };

        let stream = capability.streams(self.settings.stream_search);
        let url = self.endpoint(capability);
        tracing::debug!(capability = capability.name(), url = %url, stream, "dispatching action");
        Some(relay.dispatch(RelayRequest::post_json(url, body, stream)))
    }
}

async fn stream_text<F>(capability: Capability, reply: RelayReply, sink: &mut F) -> Result<(), ActionError>
where
    F: FnMut(&str),
{
    let mut decoder = Utf8ChunkDecoder::new();
    reply
        .for_each_chunk(|bytes| {
            let text = decoder.push(bytes);
            if !text.is_empty() {
                sink(&text);
            }
        })
        .await
        .map_err(|error| ActionError::from_relay(capability, error))?;

    let tail = decoder.finish();
    if !tail.is_empty() {
        sink(&tail);
    }
    Ok(())
}

async fn resolve(capability: Capability, reply: RelayReply) -> Result<Value, ActionError> {
    let payload = reply
        .into_json()
        .await
        .map_err(|error| ActionError::from_relay(capability, error))?;
    decode::unwrap_envelope(payload)
        .map_err(|message| ActionError::new(capability, ActionErrorKind::Upstream, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relay_protocol::{reply_pair, FailureKind};

    #[test]
    fn relay_errors_map_onto_action_error_kinds() {
        let error = ActionError::from_relay(
            Capability::ChatTurn,
            RelayError::Upstream("HTTP 503".to_string()),
        );
        assert_eq!(error.kind, ActionErrorKind::Upstream);
        assert_eq!(error.message, "HTTP 503");
        assert_eq!(error.to_string(), "chat turn failed (upstream): HTTP 503");
    }

    #[test]
    fn client_without_relay_is_in_demo_mode() {
        let client = ActionClient::demo(ClientSettings::default());
        assert!(client.is_demo());
        assert_eq!(client.endpoint(Capability::WebSearch), "http://localhost:3000/web-search");
    }

    #[tokio::test]
    async fn stream_text_reassembles_split_characters() {
        let (sender, reply) = reply_pair();
        let bytes = "naïve".as_bytes();
        sender.chunk(&bytes[..3]).await;
        sender.chunk(&bytes[3..]).await;
        sender.done();

        let mut out = Vec::new();
        stream_text(Capability::ChatTurn, reply, &mut |text: &str| out.push(text.to_string()))
            .await
            .expect("stream");
        assert_eq!(out.concat(), "naïve");
        assert_eq!(out, vec!["na".to_string(), "ïve".to_string()]);
    }

    #[tokio::test]
    async fn resolve_maps_envelope_failure_to_upstream() {
        let (sender, reply) = reply_pair();
        sender.succeed(json!({ "success": false, "error": "no credits" }));
        assert_eq!(
            resolve(Capability::ImageGeneration, reply).await,
            Err(ActionError::new(
                Capability::ImageGeneration,
                ActionErrorKind::Upstream,
                "no credits"
            ))
        );

        let (sender, reply) = reply_pair();
        sender.fail(FailureKind::Transport, "offline");
        assert_eq!(
            resolve(Capability::ImageGeneration, reply).await.map_err(|error| error.kind),
            Err(ActionErrorKind::Transport)
        );
    }
}
