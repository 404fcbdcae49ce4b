//! Backend seam — what the controller needs from the network.
//!
//! DESIGN
//! ======
//! The controller never touches HTTP directly. It opens a chat stream and
//! loads session history through [`ChatBackend`], which `ApiClient`
//! implements over reqwest and tests implement with scripted frames.

use futures::stream::BoxStream;
use serde::Serialize;

use crate::types::{ChatError, Message};

/// Raw body chunks of an open chat stream.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ChatError>>;

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    /// Only server-assigned session ids are sent; a fresh chat omits it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub user_id: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

/// Provider/model override for a single turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub provider_id: Option<String>,
    pub model_name: Option<String>,
}

/// Provider-neutral async backend. Enables scripted fakes in tests.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a streaming chat turn and return its body as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError`] if the request cannot be sent, the backend
    /// answers with a non-success status, or the response has no body.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;

    /// Load the persisted messages of a server session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`ChatError`] on transport, status, or decode failure.
    async fn load_messages(&self, chat_id: &str) -> Result<Vec<Message>, ChatError>;
}

#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;
