//! reportchat — streaming chat session client.
//!
//! ARCHITECTURE
//! ============
//! - [`controller`]: conversation state and the streaming turn lifecycle
//! - [`stream`]: pure `data:` line decoding and frame parsing
//! - [`backend`]: the seam the controller talks through
//! - [`api`]: reqwest implementation of the backend plus session REST calls
//! - [`auth`]: bearer tokens shared by every request
//! - [`config`]: environment-driven client settings
//! - [`types`]: messages, sessions, and the error taxonomy

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod controller;
pub mod stream;
pub mod types;

pub use api::ApiClient;
pub use auth::AuthContext;
pub use backend::{ChatBackend, ChatRequest, SendOptions};
pub use config::ClientConfig;
pub use controller::{ChatController, ChatObserver, ChatState, NoopObserver, SessionRef, TurnOutcome};
pub use types::{ChatError, Message, MessageKind};
