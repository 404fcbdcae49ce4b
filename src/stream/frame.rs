//! Stream frame classification.

use serde::{Deserialize, Deserializer};

/// Payload that terminates a chat stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded JSON frame. Every field is optional and a frame may carry
/// several at once (e.g. `chat_id` alongside the first `content`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamFrame {
    #[serde(default, deserialize_with = "string_or_number")]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamFrame {
    /// Non-empty `chat_id`.
    #[must_use]
    pub fn chat_id(&self) -> Option<&str> {
        non_empty(self.chat_id.as_deref())
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        non_empty(self.title.as_deref())
    }

    #[must_use]
    pub fn reasoning(&self) -> Option<&str> {
        non_empty(self.reasoning_content.as_deref())
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        non_empty(self.content.as_deref())
    }
}

/// A classified stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Done,
    Frame(StreamFrame),
}

/// Classify one `data:` payload.
///
/// # Errors
///
/// Returns the JSON error when the payload is neither the sentinel nor a
/// JSON object; callers log and skip such frames.
pub fn parse_payload(payload: &str) -> Result<StreamEvent, serde_json::Error> {
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Ok(StreamEvent::Done);
    }
    serde_json::from_str::<StreamFrame>(payload).map(StreamEvent::Frame)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Some backends emit numeric session ids.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
