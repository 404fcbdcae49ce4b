//! Client configuration parsed from environment variables.

use crate::types::ChatError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Whole-request budget for REST calls.
    pub request_secs: u64,
    pub connect_secs: u64,
    /// Longest silence between chunks of a chat stream. The stream itself
    /// has no total budget.
    pub stream_idle_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            stream_idle_secs: DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub timeouts: HttpTimeouts,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `CHAT_BASE_URL`: backend origin, default `http://127.0.0.1:8000`
    /// - `CHAT_USER_ID`: user id sent with every chat turn
    /// - `CHAT_ACCESS_TOKEN` / `CHAT_REFRESH_TOKEN`: seed credentials
    /// - `CHAT_REQUEST_TIMEOUT_SECS`: default 300
    /// - `CHAT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CHAT_STREAM_IDLE_TIMEOUT_SECS`: default 60
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if `CHAT_BASE_URL` is not an http(s) URL.
    pub fn from_env() -> Result<Self, ChatError> {
        let base_url = normalize_base_url(
            &std::env::var("CHAT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        )?;
        let timeouts = HttpTimeouts {
            request_secs: env_parse("CHAT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("CHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            stream_idle_secs: env_parse("CHAT_STREAM_IDLE_TIMEOUT_SECS", DEFAULT_STREAM_IDLE_TIMEOUT_SECS),
        };

        Ok(Self {
            base_url,
            user_id: env_non_empty("CHAT_USER_ID"),
            access_token: env_non_empty("CHAT_ACCESS_TOKEN"),
            refresh_token: env_non_empty("CHAT_REFRESH_TOKEN"),
            timeouts,
        })
    }
}

impl ClientConfig {
    /// Replace the backend origin, validated the same way as `CHAT_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if `base_url` is not an http(s) URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ChatError> {
        self.base_url = normalize_base_url(base_url)?;
        Ok(self)
    }
}

/// Trim trailing slashes and reject anything that is not an http(s) origin.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ChatError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ChatError::Config(format!("CHAT_BASE_URL must start with http:// or https://, got '{raw}'")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
