//! Payload types exchanged with the problem-solving and file-analysis capabilities.

use std::fmt;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    #[serde(alias = "expectedOutput")]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Problem statement sent to the solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsaProblem {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub examples: Vec<TestCase>,
}

impl DsaProblem {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            difficulty: Difficulty::default(),
            category: "general".to_string(),
            tags: Vec::new(),
            constraints: Vec::new(),
            examples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsaSolution {
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub approach: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub time_complexity: String,
    #[serde(default)]
    pub space_complexity: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityAnalysis {
    pub time_complexity: String,
    pub space_complexity: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization: Option<String>,
}

/// A file picked by the user. `content` is base64 for binary files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    pub content: String,
}

impl UploadedFile {
    /// UTF-8 files are sent verbatim, anything else as base64.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_type_for(&name).to_string();
        let size = bytes.len() as u64;
        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(error) => base64::engine::general_purpose::STANDARD.encode(error.into_bytes()),
        };

        Self {
            name,
            mime_type,
            size,
            content,
        }
    }
}

fn mime_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "rs" | "py" | "js" | "ts" | "java" | "c" | "cpp" | "go" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileAnalysis {
    pub summary: String,
    /// Full decoded payload, kept for callers that render more than the summary.
    pub details: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_upload_is_sent_verbatim() {
        let file = UploadedFile::from_bytes("notes.md", b"# Title".to_vec());
        assert_eq!(file.mime_type, "text/markdown");
        assert_eq!(file.size, 7);
        assert_eq!(file.content, "# Title");
    }

    #[test]
    fn binary_upload_is_base64_encoded() {
        let file = UploadedFile::from_bytes("pixel.PNG", vec![0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.content, "iVBORw==");
        assert_eq!(
            serde_json::to_value(&file).expect("json")["type"],
            serde_json::json!("image/png")
        );
    }

    #[test]
    fn solution_accepts_sparse_payloads() {
        let solution: DsaSolution = serde_json::from_value(serde_json::json!({
            "code": "print(1)",
            "timeComplexity": "O(1)",
            "testCases": [{ "input": "1", "expectedOutput": "1" }]
        }))
        .expect("solution");
        assert_eq!(solution.time_complexity, "O(1)");
        assert_eq!(solution.space_complexity, "");
        assert_eq!(solution.test_cases[0].output, "1");
    }
}
