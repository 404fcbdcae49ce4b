//! Observable conversation state.

use serde::Serialize;
use uuid::Uuid;

use crate::types::{Message, MessageKind};

/// Which session the controller is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SessionRef {
    /// Nothing sent yet; the next turn creates a server session.
    #[default]
    None,
    /// Client-generated placeholder, never sent to the backend.
    Local(String),
    /// Server-assigned session id.
    Server(String),
}

impl SessionRef {
    #[must_use]
    pub fn local() -> Self {
        Self::Local(Uuid::new_v4().to_string())
    }

    /// The id to send as `chat_id`, if the backend knows this session.
    #[must_use]
    pub fn server_id(&self) -> Option<&str> {
        match self {
            Self::Server(id) => Some(id),
            Self::None | Self::Local(_) => None,
        }
    }
}

/// Snapshot of everything the view renders for one conversation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub session: SessionRef,
    pub title: Option<String>,
    /// Set when the session was created by the current stream, so its
    /// history is already local and must not be reloaded.
    pub is_new_chat: bool,
    pub is_loading: bool,
    /// Bumped on every session switch/reset; turns started under an older
    /// epoch no longer write into this state.
    #[serde(skip)]
    pub(crate) epoch: u64,
}

impl ChatState {
    pub(crate) fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    #[must_use]
    pub fn message(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Index of the most recent user message.
    #[must_use]
    pub fn last_user_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.kind == MessageKind::User)
    }

    /// Forget the conversation and detach from any session.
    pub(crate) fn reset(&mut self, session: SessionRef) {
        self.epoch += 1;
        self.messages.clear();
        self.title = None;
        self.is_new_chat = false;
        self.is_loading = false;
        self.session = session;
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
