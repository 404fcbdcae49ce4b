//! Auth context — the credentials every authenticated call reads.
//!
//! DESIGN
//! ======
//! One `AuthContext` is created at startup (seeded from config or a login)
//! and shared by `Arc` with every client that needs a bearer token. It is
//! cleared on logout and whenever a token refresh fails, which forces the
//! caller back through login. Nothing is persisted across processes.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::ClientConfig;

/// The signed-in user as reported by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default)]
struct AuthInner {
    tokens: Option<AuthTokens>,
    user: Option<AuthUser>,
}

/// Shared, mutable credential store.
#[derive(Debug, Default)]
pub struct AuthContext {
    inner: RwLock<AuthInner>,
}

impl AuthContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from `CHAT_ACCESS_TOKEN` / `CHAT_REFRESH_TOKEN` when present.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let tokens = config.access_token.clone().map(|access_token| AuthTokens {
            access_token,
            refresh_token: config.refresh_token.clone(),
        });
        Self { inner: RwLock::new(AuthInner { tokens, user: None }) }
    }

    /// Install fresh credentials after a successful login.
    pub async fn sign_in(&self, tokens: AuthTokens, user: Option<AuthUser>) {
        let mut inner = self.inner.write().await;
        inner.tokens = Some(tokens);
        inner.user = user;
    }

    /// Replace the access token after a refresh. A missing refresh token in
    /// the refresh response keeps the previous one.
    pub async fn rotate(&self, access_token: String, refresh_token: Option<String>) {
        let mut inner = self.inner.write().await;
        let previous_refresh = inner.tokens.take().and_then(|t| t.refresh_token);
        inner.tokens = Some(AuthTokens { access_token, refresh_token: refresh_token.or(previous_refresh) });
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.tokens.as_ref().map(|t| t.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .tokens
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
    }

    pub async fn user(&self) -> Option<AuthUser> {
        self.inner.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.tokens.is_some()
    }

    /// Drop all credentials. Subsequent authenticated calls fail with
    /// `Unauthenticated` until the next `sign_in`.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.tokens = None;
        inner.user = None;
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
