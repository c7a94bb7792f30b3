//! Canned local results used when no privileged context is attached.

use serde_json::Value;

use crate::models::{ComplexityAnalysis, DsaProblem, DsaSolution, FileAnalysis, TestCase, UploadedFile};

pub const DEMO_IMAGE_URL: &str = "https://placehold.co/512x512?text=zerotrace+demo";

pub(crate) fn chat_reply(prompt: &str) -> String {
    format!(
        "This is a demo response. The assistant backend is not connected, so I can only echo your message: \"{}\". Start the extension background context to get real answers.",
        prompt.trim()
    )
}

/// Splits `text` into word-sized segments that concatenate back to `text`.
pub(crate) fn word_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if ch == ' ' {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub(crate) fn search_summary(query: &str) -> String {
    format!(
        "Web search results for \"{query}\":\n\nThis is a demo search result. Connect the backend to search the web."
    )
}

pub(crate) fn function_result(name: &str, arguments: &Value) -> String {
    let pretty = serde_json::to_string_pretty(arguments).unwrap_or_else(|_| arguments.to_string());
    format!("Function \"{name}\" executed with arguments:\n{pretty}\n\nThis is a demo result.")
}

pub(crate) fn solution(problem: &DsaProblem, language: &str) -> DsaSolution {
    DsaSolution {
        code: format!(
            "// {}\n// Demo solution in {language}. Connect the backend for a real answer.\n",
            problem.title
        ),
        language: language.to_string(),
        approach: "Demo approach".to_string(),
        explanation: "The backend is not connected, so this solution is a placeholder.".to_string(),
        time_complexity: "O(n)".to_string(),
        space_complexity: "O(1)".to_string(),
        test_cases: problem.examples.clone(),
    }
}

pub(crate) fn complexity() -> ComplexityAnalysis {
    ComplexityAnalysis {
        time_complexity: "O(n)".to_string(),
        space_complexity: "O(1)".to_string(),
        explanation: "Demo analysis. Connect the backend for a real complexity breakdown.".to_string(),
        optimization: None,
    }
}

pub(crate) fn test_cases(description: &str, count: u32) -> Vec<TestCase> {
    (1..=count)
        .map(|index| TestCase {
            input: format!("sample input {index}"),
            output: format!("sample output {index}"),
            description: Some(format!("Demo case {index} for: {description}")),
        })
        .collect()
}

pub(crate) fn file_analysis(file: &UploadedFile) -> FileAnalysis {
    let summary = format!(
        "Demo analysis of {} ({}, {} bytes). Connect the backend for a real analysis.",
        file.name, file.mime_type, file.size
    );
    FileAnalysis {
        details: serde_json::json!({ "summary": summary }),
        summary,
    }
}
