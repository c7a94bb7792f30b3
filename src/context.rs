//! Page context attached to chat turns.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

/// Upper bound on page text forwarded with a chat turn, in characters.
pub const MAX_PAGE_CONTENT_CHARS: usize = 3000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub webpage_content: String,
    pub selected_text: String,
}

impl PageContext {
    /// Builds a context, truncating page text to [`MAX_PAGE_CONTENT_CHARS`].
    pub fn new(webpage_content: &str, selected_text: impl Into<String>) -> Self {
        Self {
            webpage_content: truncate_chars(webpage_content, MAX_PAGE_CONTENT_CHARS),
            selected_text: selected_text.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.webpage_content.is_empty() && self.selected_text.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("no page is available")]
    Unavailable,
    #[error("failed to read page context from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies the active page's text. Failures are never fatal to a chat turn.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn snapshot(&self) -> Result<PageContext, ContextError>;
}

/// Reads page text from a local file.
///
/// A line consisting of `---selection---` splits the file into page text and
/// selected text.
#[derive(Debug, Clone)]
pub struct FileContextSource {
    path: PathBuf,
}

pub const SELECTION_MARKER: &str = "---selection---";

impl FileContextSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ContextSource for FileContextSource {
    async fn snapshot(&self) -> Result<PageContext, ContextError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ContextError::Io {
                path: self.path.clone(),
                source,
            })?;

        let (page, selection) = match raw.split_once(&format!("\n{SELECTION_MARKER}\n")) {
            Some((page, selection)) => (page, selection.trim()),
            None => (raw.as_str(), ""),
        };
        Ok(PageContext::new(page.trim(), selection))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}
