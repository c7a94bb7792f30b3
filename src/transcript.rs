//! Ordered conversation record.
//!
//! User messages are immutable once pushed. An assistant message stays open
//! while its action is in flight and is sealed exactly once when the action
//! settles; after that every mutation is rejected.

use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{Difficulty, TestCase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Which action produced a plain text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Chat,
    Search,
    Function { name: String },
}

/// Typed metadata carried by a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text {
        model: Option<String>,
        source: Option<TextSource>,
    },
    Image {
        model: String,
        image_url: Option<String>,
    },
    Solution {
        model: String,
        difficulty: Difficulty,
        category: String,
        time_complexity: String,
        space_complexity: String,
        language: String,
        test_cases: Vec<TestCase>,
    },
    ComplexityAnalysis {
        model: String,
        time_complexity: String,
        space_complexity: String,
    },
    DsaProblem {
        model: String,
        test_cases: Vec<TestCase>,
    },
    File {
        model: String,
        file_name: String,
    },
}

impl MessageKind {
    pub fn plain() -> Self {
        Self::Text {
            model: None,
            source: None,
        }
    }

    pub fn text(model: impl Into<String>, source: TextSource) -> Self {
        Self::Text {
            model: Some(model.into()),
            source: Some(source),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Solution { .. } => "solution",
            Self::ComplexityAnalysis { .. } => "complexity-analysis",
            Self::DsaProblem { .. } => "dsa-problem",
            Self::File { .. } => "file",
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Text { model, .. } => model.as_deref(),
            Self::Image { model, .. }
            | Self::Solution { model, .. }
            | Self::ComplexityAnalysis { model, .. }
            | Self::DsaProblem { model, .. }
            | Self::File { model, .. } => Some(model),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    kind: MessageKind,
    timestamp: OffsetDateTime,
    sealed: bool,
    failed: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            kind: MessageKind::plain(),
            timestamp: OffsetDateTime::now_utc(),
            sealed: true,
            failed: false,
        }
    }

    /// Empty assistant message awaiting a result.
    pub fn placeholder(kind: MessageKind) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Assistant,
            content: String::new(),
            kind,
            timestamp: OffsetDateTime::now_utc(),
            sealed: false,
            failed: false,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// True for a placeholder sealed with a diagnostic instead of a result.
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("message {0} is not in the transcript")]
    UnknownMessage(MessageId),
    #[error("message {0} is sealed")]
    Sealed(MessageId),
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a user message followed by its assistant placeholder.
    pub fn push_turn(&mut self, user: Message, placeholder: Message) -> (MessageId, MessageId) {
        let ids = (user.id, placeholder.id);
        self.messages.push(user);
        self.messages.push(placeholder);
        ids
    }

    pub fn append(&mut self, id: MessageId, text: &str) -> Result<(), TranscriptError> {
        self.open_mut(id)?.content.push_str(text);
        Ok(())
    }

    pub fn replace(&mut self, id: MessageId, text: impl Into<String>) -> Result<(), TranscriptError> {
        self.open_mut(id)?.content = text.into();
        Ok(())
    }

    pub fn set_kind(&mut self, id: MessageId, kind: MessageKind) -> Result<(), TranscriptError> {
        self.open_mut(id)?.kind = kind;
        Ok(())
    }

    pub fn seal(&mut self, id: MessageId) -> Result<(), TranscriptError> {
        self.open_mut(id)?.sealed = true;
        Ok(())
    }

    /// Replaces the content with `diagnostic` and seals the message as failed.
    pub fn seal_failed(
        &mut self,
        id: MessageId,
        diagnostic: impl Into<String>,
    ) -> Result<(), TranscriptError> {
        let message = self.open_mut(id)?;
        message.content = diagnostic.into();
        message.sealed = true;
        message.failed = true;
        Ok(())
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn open_mut(&mut self, id: MessageId) -> Result<&mut Message, TranscriptError> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.id == id)
            .ok_or(TranscriptError::UnknownMessage(id))?;
        if message.sealed {
            return Err(TranscriptError::Sealed(id));
        }
        Ok(message)
    }
}
