//! Environment configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use relay_background::BackgroundConfig;

use crate::client::ClientSettings;
use crate::credits::DEFAULT_CREDITS;
use crate::url::{normalize_backend_url, DEFAULT_BACKEND_URL};

pub const ENV_BACKEND_URL: &str = "ZEROTRACE_BACKEND_URL";
pub const ENV_MODEL: &str = "ZEROTRACE_MODEL";
pub const ENV_CREDITS: &str = "ZEROTRACE_CREDITS";
pub const ENV_DEMO: &str = "ZEROTRACE_DEMO";
pub const ENV_SEARCH_STREAM: &str = "ZEROTRACE_SEARCH_STREAM";
pub const ENV_RELAY_TIMEOUT_SEC: &str = "ZEROTRACE_RELAY_TIMEOUT_SEC";
pub const ENV_CONTEXT_FILE: &str = "ZEROTRACE_CONTEXT_FILE";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be an http(s) URL, got {value:?}")]
    InvalidUrl { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    pub backend_url: String,
    pub model: String,
    pub credits: u64,
    /// Skips the background relay and answers every action locally.
    pub demo: bool,
    pub stream_search: bool,
    pub relay_timeout: Option<Duration>,
    pub context_file: Option<PathBuf>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            credits: DEFAULT_CREDITS,
            demo: false,
            stream_search: false,
            relay_timeout: None,
            context_file: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key).and_then(|value| {
                if value.trim().is_empty() {
                    None
                } else {
                    Some(value.trim().to_string())
                }
            })
        };

        let mut config = Self::default();

        if let Some(value) = get(ENV_BACKEND_URL) {
            config.backend_url = parse_backend_url(&value)?;
        }
        if let Some(value) = get(ENV_MODEL) {
            config.model = value;
        }
        if let Some(value) = get(ENV_CREDITS) {
            config.credits = parse_number(ENV_CREDITS, &value)?;
        }
        config.demo = get(ENV_DEMO).is_some_and(|value| is_truthy(&value));
        config.stream_search = get(ENV_SEARCH_STREAM).is_some_and(|value| is_truthy(&value));
        if let Some(value) = get(ENV_RELAY_TIMEOUT_SEC) {
            let secs = parse_number(ENV_RELAY_TIMEOUT_SEC, &value)?;
            config.relay_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        config.context_file = get(ENV_CONTEXT_FILE).map(PathBuf::from);

        Ok(config)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.backend_url.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream_search: self.stream_search,
        }
    }

    pub fn background_config(&self) -> BackgroundConfig {
        let config = BackgroundConfig::default();
        match self.relay_timeout {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }
}

fn parse_backend_url(value: &str) -> Result<String, ConfigError> {
    let normalized = normalize_backend_url(value);
    match url::Url::parse(&normalized) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(normalized),
        _ => Err(ConfigError::InvalidUrl {
            key: ENV_BACKEND_URL,
            value: value.to_string(),
        }),
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
