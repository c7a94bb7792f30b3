use std::collections::BTreeMap;
use std::time::Duration;

/// Default `User-Agent` sent with relayed requests.
pub const DEFAULT_USER_AGENT: &str = concat!("zerotrace-relay/", env!("CARGO_PKG_VERSION"));

/// Transport configuration for the privileged fetch context.
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// `User-Agent` applied unless a request carries its own.
    pub user_agent: String,
    /// Headers merged under each request's own headers.
    pub default_headers: BTreeMap<String, String>,
    /// Optional per-request timeout. `None` lets a stalled exchange wait forever.
    pub timeout: Option<Duration>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: BTreeMap::new(),
            timeout: None,
        }
    }
}

impl BackgroundConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    /// Resolves the headers for one request; request headers win on conflict.
    pub fn merged_headers(&self, request: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("user-agent".to_string(), self.user_agent.trim().to_string());

        for (key, value) in self.default_headers.iter().chain(request) {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        headers
    }
}
