//! JSON envelopes exchanged between the UI and background contexts.
//!
//! Request: `{"type":"API_REQUEST","url":...,"options":{...},"stream":bool}`.
//! Replies: `{"success":true,"data":...}`, `{"success":false,"error":"..."}`,
//! `{"chunk":"<base64>"}` and `{"done":true}`.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FailureKind, RelayError, RelayEvent, RelayRequest, RequestOptions};

/// Message posted from the UI context to the background context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayEnvelope {
    #[serde(rename = "API_REQUEST")]
    ApiRequest {
        url: String,
        #[serde(default)]
        options: RequestOptions,
        #[serde(default)]
        stream: bool,
    },
}

impl From<RelayRequest> for RelayEnvelope {
    fn from(request: RelayRequest) -> Self {
        Self::ApiRequest {
            url: request.url,
            options: request.options,
            stream: request.stream,
        }
    }
}

impl From<RelayEnvelope> for RelayRequest {
    fn from(envelope: RelayEnvelope) -> Self {
        match envelope {
            RelayEnvelope::ApiRequest {
                url,
                options,
                stream,
            } => Self {
                url,
                options,
                stream,
            },
        }
    }
}

/// Message posted back from the background context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyEnvelope {
    Outcome {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Chunk {
        chunk: String,
    },
    Done {
        done: bool,
    },
}

impl ReplyEnvelope {
    #[must_use]
    pub fn from_event(event: &RelayEvent) -> Self {
        match event {
            RelayEvent::Chunk(bytes) => Self::Chunk {
                chunk: general_purpose::STANDARD.encode(bytes),
            },
            RelayEvent::Done => Self::Done { done: true },
            RelayEvent::Success(data) => Self::Outcome {
                success: true,
                data: Some(data.clone()),
                error: None,
            },
            RelayEvent::Failure { message, .. } => Self::Outcome {
                success: false,
                data: None,
                error: Some(message.clone()),
            },
        }
    }

    /// Decodes the envelope. Wire failures carry no origin and map to upstream.
    pub fn into_event(self) -> Result<RelayEvent, RelayError> {
        match self {
            Self::Outcome {
                success: true,
                data,
                ..
            } => Ok(RelayEvent::Success(data.unwrap_or(Value::Null))),
            Self::Outcome {
                success: false,
                error,
                ..
            } => Ok(RelayEvent::Failure {
                kind: FailureKind::Upstream,
                message: error.unwrap_or_else(|| "unknown error".to_string()),
            }),
            Self::Chunk { chunk } => general_purpose::STANDARD
                .decode(chunk.as_bytes())
                .map(RelayEvent::Chunk)
                .map_err(|error| {
                    RelayError::UnexpectedReply(format!("chunk is not valid base64: {error}"))
                }),
            Self::Done { done: true } => Ok(RelayEvent::Done),
            Self::Done { done: false } => Err(RelayError::UnexpectedReply(
                "done envelope must carry done=true".to_string(),
            )),
        }
    }
}
