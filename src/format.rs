//! Markdown renderings of structured results, as stored in the transcript.

use crate::models::{ComplexityAnalysis, DsaSolution, TestCase};

pub const IMAGE_CAPTION: &str = "Here is your generated image:";

pub fn solution(title: &str, solution: &DsaSolution) -> String {
    format!(
        "**Solution for {title}**\n\n{}\n\n**Complexity Analysis:**\n- Time: {}\n- Space: {}\n\n**Approach:** {}\n\n**Explanation:** {}",
        solution.code,
        solution.time_complexity,
        solution.space_complexity,
        solution.approach,
        solution.explanation
    )
}

pub fn complexity(analysis: &ComplexityAnalysis) -> String {
    let mut out = format!(
        "**Complexity Analysis**\n\n- **Time Complexity:** {}\n- **Space Complexity:** {}\n\n**Explanation:** {}",
        analysis.time_complexity, analysis.space_complexity, analysis.explanation
    );
    if let Some(optimization) = analysis.optimization.as_deref().filter(|text| !text.is_empty()) {
        out.push_str("\n\n**Optimization:** ");
        out.push_str(optimization);
    }
    out
}

pub fn test_cases(cases: &[TestCase]) -> String {
    let body = cases
        .iter()
        .enumerate()
        .map(|(index, case)| {
            let mut entry = format!(
                "**Test Case {}:**\nInput: {}\nOutput: {}",
                index + 1,
                case.input,
                case.output
            );
            if let Some(description) = &case.description {
                entry.push_str("\nDescription: ");
                entry.push_str(description);
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("**Generated Test Cases**\n\n{body}")
}

pub fn file_analysis(file_name: &str, summary: &str) -> String {
    format!("**File Analysis: {file_name}**\n\n{summary}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cases_are_numbered_and_described() {
        let cases = vec![
            TestCase {
                input: "[1,2]".to_string(),
                output: "3".to_string(),
                description: None,
            },
            TestCase {
                input: "[]".to_string(),
                output: "0".to_string(),
                description: Some("empty".to_string()),
            },
        ];

        assert_eq!(
            test_cases(&cases),
            "**Generated Test Cases**\n\n**Test Case 1:**\nInput: [1,2]\nOutput: 3\n\n**Test Case 2:**\nInput: []\nOutput: 0\nDescription: empty"
        );
    }

    #[test]
    fn complexity_omits_missing_optimization() {
        let analysis = ComplexityAnalysis {
            time_complexity: "O(n log n)".to_string(),
            space_complexity: "O(n)".to_string(),
            explanation: "sorting dominates".to_string(),
            optimization: None,
        };
        assert_eq!(
            complexity(&analysis),
            "**Complexity Analysis**\n\n- **Time Complexity:** O(n log n)\n- **Space Complexity:** O(n)\n\n**Explanation:** sorting dominates"
        );
    }

    #[test]
    fn solution_lists_code_then_complexity() {
        let rendered = solution(
            "Two Sum",
            &DsaSolution {
                code: "fn two_sum() {}".to_string(),
                language: "rust".to_string(),
                approach: "hash map".to_string(),
                explanation: "one pass".to_string(),
                time_complexity: "O(n)".to_string(),
                space_complexity: "O(n)".to_string(),
                test_cases: Vec::new(),
            },
        );
        assert!(rendered.starts_with("**Solution for Two Sum**\n\nfn two_sum() {}"));
        assert!(rendered.contains("- Time: O(n)\n- Space: O(n)"));
    }
}
