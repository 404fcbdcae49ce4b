//! Chat types — conversation messages, sessions, and errors.
//!
//! DESIGN
//! ======
//! `Message` is the view-facing record the controller mutates while a turn
//! streams. REST wire shapes (`ChatSession`, `Page`, `HistoryMessage`,
//! `ModelProvider`) mirror the backend's JSON so they deserialize directly.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Text shown in place of the AI reply when a turn fails.
pub const FAILURE_MESSAGE: &str = "Sorry, something went wrong while generating a response. Please try again.";

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by the chat client.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A configuration value is missing or could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request could not be sent or the body could not be read.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success HTTP status.
    #[error("backend returned status {status}")]
    Status { status: u16, body: String },

    /// The stream response carried no body to read.
    #[error("response body missing")]
    MissingBody,

    /// A REST response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// No access token is available for an authenticated call.
    #[error("not authenticated")]
    Unauthenticated,

    /// The access token expired and refreshing it failed; credentials were cleared.
    #[error("session expired; please log in again")]
    SessionExpired,

    /// Regeneration needs at least one prior user message.
    #[error("no previous user message to regenerate")]
    NothingToRegenerate,
}

impl ChatError {
    /// Stable machine-readable code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E_CONFIG",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Transport(_) => "E_TRANSPORT",
            Self::Status { .. } => "E_STATUS",
            Self::MissingBody => "E_MISSING_BODY",
            Self::Decode(_) => "E_DECODE",
            Self::Unauthenticated => "E_UNAUTHENTICATED",
            Self::SessionExpired => "E_SESSION_EXPIRED",
            Self::NothingToRegenerate => "E_NOTHING_TO_REGENERATE",
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Ai,
}

/// A single conversation message as the view renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub kind: MessageKind,
    pub content: String,
    /// `true` while the AI reply is still streaming.
    pub loading: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Accumulated reasoning text, if the model emitted any.
    pub thinking: Option<String>,
    /// Whole seconds spent in the thinking phase.
    pub thinking_duration: Option<u64>,
    pub is_thinking: bool,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MessageKind::User,
            content: content.into(),
            loading: false,
            timestamp: OffsetDateTime::now_utc(),
            thinking: None,
            thinking_duration: None,
            is_thinking: false,
        }
    }

    /// Empty AI reply awaiting its first stream fragment.
    #[must_use]
    pub fn ai_placeholder() -> Self {
        Self { kind: MessageKind::Ai, loading: true, ..Self::user(String::new()) }
    }
}

// =============================================================================
// SESSIONS
// =============================================================================

/// A persisted conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Paginated list response used by every collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

/// A message as stored by the backend for a session's history.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    /// Backends differ on string vs numeric ids; only uuid strings are kept.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<HistoryMessage> for Message {
    fn from(h: HistoryMessage) -> Self {
        let kind = if h.role == "user" { MessageKind::User } else { MessageKind::Ai };
        let id = h
            .id
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .unwrap_or_else(Uuid::new_v4);
        Self {
            id,
            kind,
            content: h.content,
            loading: false,
            timestamp: h
                .created_at
                .as_deref()
                .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
                .unwrap_or_else(OffsetDateTime::now_utc),
            thinking: h.reasoning_content.filter(|r| !r.is_empty()),
            thinking_duration: None,
            is_thinking: false,
        }
    }
}

/// A configured model provider and the models it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProvider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub models: Vec<String>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
