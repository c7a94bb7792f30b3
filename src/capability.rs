use std::fmt;

/// User-facing backend capability reachable through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ChatTurn,
    WebSearch,
    FunctionCall,
    ImageGeneration,
    ProblemSolve,
    ComplexityAnalysis,
    TestCaseGeneration,
    FileAnalysis,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Self::ChatTurn,
        Self::WebSearch,
        Self::FunctionCall,
        Self::ImageGeneration,
        Self::ProblemSolve,
        Self::ComplexityAnalysis,
        Self::TestCaseGeneration,
        Self::FileAnalysis,
    ];

    /// Backend path, relative to the configured base address.
    pub fn path(&self) -> &'static str {
        match self {
            Self::ChatTurn => "/chat",
            Self::WebSearch => "/web-search",
            Self::FunctionCall => "/function-call",
            Self::ImageGeneration => "/image-generate",
            Self::ProblemSolve => "/dsa-solve",
            Self::ComplexityAnalysis => "/complexity-analyze",
            Self::TestCaseGeneration => "/test-cases-generate",
            Self::FileAnalysis => "/file-analyze",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ChatTurn => "chat turn",
            Self::WebSearch => "web search",
            Self::FunctionCall => "function call",
            Self::ImageGeneration => "image generation",
            Self::ProblemSolve => "problem solve",
            Self::ComplexityAnalysis => "complexity analysis",
            Self::TestCaseGeneration => "test-case generation",
            Self::FileAnalysis => "file analysis",
        }
    }

    /// Credits charged after a successful call.
    pub fn cost(&self) -> u64 {
        match self {
            Self::ImageGeneration => 5,
            Self::ProblemSolve => 3,
            Self::WebSearch => 2,
            Self::ChatTurn
            | Self::FunctionCall
            | Self::ComplexityAnalysis
            | Self::TestCaseGeneration
            | Self::FileAnalysis => 1,
        }
    }

    /// Whether the exchange streams its body. Web search is configurable.
    pub fn streams(&self, stream_search: bool) -> bool {
        match self {
            Self::ChatTurn => true,
            Self::WebSearch => stream_search,
            _ => false,
        }
    }

    /// Fixed assistant text shown when the capability fails.
    pub fn diagnostic(&self, backend_url: &str) -> String {
        match self {
            Self::ChatTurn => format!(
                "I apologize, but I encountered an issue. Please make sure your backend server is running at {backend_url}. If the server is running, check the console for more details."
            ),
            Self::WebSearch => format!(
                "I encountered an issue with the web search. Please try again or check your backend server connection at {backend_url}."
            ),
            Self::FunctionCall => format!(
                "I encountered an issue executing the function. Please try again or check your backend server connection at {backend_url}."
            ),
            other => format!(
                "I encountered an issue with the {}. Please try again or check your backend server connection at {backend_url}.",
                other.name()
            ),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
