use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::client::AssistantMode;

/// Function used when the input is not written as `name(args)`.
pub const DEFAULT_FUNCTION_NAME: &str = "demo_function";
pub const DEFAULT_TEST_CASE_COUNT: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    New,
    Quit,
    Credits,
    Mode(AssistantMode),
    Model(String),
    Search(String),
    Function(String),
    Image(String),
    Solve {
        language: String,
        title: String,
        statement: String,
    },
    Complexity {
        language: String,
        code: String,
    },
    Tests {
        count: u32,
        description: String,
    },
    File(PathBuf),
    /// Known command with missing or malformed arguments.
    Usage(&'static str),
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
/search <query>                     search the web
/fn <name>(<json args>)             call a backend function
/image <prompt>                     generate an image
/solve <language> <title>: <text>   solve a coding problem
/complexity <language> <code>       analyze time and space complexity
/tests [count] <description>        generate test cases
/file <path>                        analyze a local file
/model <name>                       switch the chat model
/mode chat|dsa                      switch the assistant mode
/credits                            show the remaining credits
/new                                start a new chat
/quit                               exit";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/new" | "/clear" => SlashCommand::New,
        "/quit" | "/exit" => SlashCommand::Quit,
        "/credits" => SlashCommand::Credits,
        "/mode" => match rest {
            "chat" => SlashCommand::Mode(AssistantMode::Chat),
            "dsa" | "dsa-solver" => SlashCommand::Mode(AssistantMode::DsaSolver),
            _ => SlashCommand::Usage("/mode chat|dsa"),
        },
        "/model" if !rest.is_empty() => SlashCommand::Model(rest.to_string()),
        "/model" => SlashCommand::Usage("/model <name>"),
        "/search" if !rest.is_empty() => SlashCommand::Search(rest.to_string()),
        "/search" => SlashCommand::Usage("/search <query>"),
        "/fn" if !rest.is_empty() => SlashCommand::Function(rest.to_string()),
        "/fn" => SlashCommand::Usage("/fn <name>(<json args>)"),
        "/image" if !rest.is_empty() => SlashCommand::Image(rest.to_string()),
        "/image" => SlashCommand::Usage("/image <prompt>"),
        "/solve" => parse_solve(rest),
        "/complexity" => match rest.split_once(char::is_whitespace) {
            Some((language, code)) if !code.trim().is_empty() => SlashCommand::Complexity {
                language: language.to_string(),
                code: code.trim().to_string(),
            },
            _ => SlashCommand::Usage("/complexity <language> <code>"),
        },
        "/tests" => parse_tests(rest),
        "/file" if !rest.is_empty() => SlashCommand::File(PathBuf::from(rest)),
        "/file" => SlashCommand::Usage("/file <path>"),
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

fn parse_solve(rest: &str) -> SlashCommand {
    const USAGE: &str = "/solve <language> <title>: <text>";
    let Some((language, problem)) = rest.split_once(char::is_whitespace) else {
        return SlashCommand::Usage(USAGE);
    };
    let (title, statement) = match problem.split_once(':') {
        Some((title, statement)) => (title.trim(), statement.trim()),
        None => (problem.trim(), problem.trim()),
    };
    if title.is_empty() {
        return SlashCommand::Usage(USAGE);
    }
    SlashCommand::Solve {
        language: language.to_string(),
        title: title.to_string(),
        statement: statement.to_string(),
    }
}

fn parse_tests(rest: &str) -> SlashCommand {
    let (count, description) = match rest.split_once(char::is_whitespace) {
        Some((first, tail)) => match first.parse::<u32>() {
            Ok(count) => (count, tail.trim()),
            Err(_) => (DEFAULT_TEST_CASE_COUNT, rest),
        },
        None => (DEFAULT_TEST_CASE_COUNT, rest),
    };
    if description.is_empty() || count == 0 {
        return SlashCommand::Usage("/tests [count] <description>");
    }
    SlashCommand::Tests {
        count,
        description: description.to_string(),
    }
}

fn function_call_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| Regex::new(r"^(\w+)\((.*)\)$").expect("function call regex must compile"))
}

/// Backend function name plus JSON arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// Parses `name(args)`.
///
/// `args` is read as JSON; text that is not JSON is passed as `{"query": args}`.
/// Input not shaped like a call invokes [`DEFAULT_FUNCTION_NAME`] with the whole
/// input as its query. Blank input yields `None`.
pub fn parse_function_call(input: &str) -> Option<FunctionCall> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Some(captures) = function_call_regex().captures(trimmed) else {
        return Some(FunctionCall {
            name: DEFAULT_FUNCTION_NAME.to_string(),
            arguments: json!({ "query": trimmed }),
        });
    };

    let name = captures.get(1).map_or("", |m| m.as_str()).to_string();
    let raw = captures.get(2).map_or("", |m| m.as_str()).trim();
    let arguments = if raw.is_empty() {
        json!({})
    } else {
        serde_json::from_str(raw).unwrap_or_else(|_| json!({ "query": raw }))
    };

    Some(FunctionCall { name, arguments })
}
