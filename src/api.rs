//! REST + streaming client for the chat backend.
//!
//! DESIGN
//! ======
//! `ApiClient` owns one reqwest client and a shared [`AuthContext`]. Every
//! authenticated call goes through `send_authorized`, which attaches the
//! bearer token and handles expiry: a `401` triggers one token refresh and
//! one retry of the original request.
//!
//! ERROR HANDLING
//! ==============
//! A failed refresh, or a second `401` after a successful refresh, clears the
//! auth context and surfaces `SessionExpired`. Other non-2xx responses become
//! `ChatError::Status` with the body kept for logs.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{AuthContext, AuthTokens, AuthUser};
use crate::backend::{ByteStream, ChatBackend, ChatRequest};
use crate::config::ClientConfig;
use crate::types::{ChatError, ChatSession, HistoryMessage, Message, ModelProvider, Page};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryBody {
    List(Vec<HistoryMessage>),
    Wrapped { messages: Vec<HistoryMessage> },
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct ApiClient {
    http: Client,
    /// Chat streams: idle-gap limit only, since a reply may stream for longer
    /// than any whole-request budget.
    stream_http: Client,
    base_url: Url,
    auth: Arc<AuthContext>,
    /// Serializes refreshes so concurrent `401`s trigger a single refresh call.
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    /// Build a client for `config.base_url` sharing `auth`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client fails to build.
    pub fn new(config: &ClientConfig, auth: Arc<AuthContext>) -> Result<Self, ChatError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ChatError::Config(format!("invalid base URL: {e}")))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ChatError::HttpClientBuild(e.to_string()))?;
        let stream_http = Client::builder()
            .read_timeout(Duration::from_secs(config.timeouts.stream_idle_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ChatError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, stream_http, base_url, auth, refresh_lock: Mutex::new(()) })
    }

    #[must_use]
    pub fn auth(&self) -> &Arc<AuthContext> {
        &self.auth
    }

    // -------------------------------------------------------------------------
    // auth
    // -------------------------------------------------------------------------

    /// Exchange credentials for tokens and install them in the auth context.
    ///
    /// # Errors
    ///
    /// Returns `Status` for rejected credentials, or a transport/decode error.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<AuthUser>, ChatError> {
        let url = self.endpoint(&["api", "auth", "login"])?;
        let response = self
            .http
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(transport)?;
        let body: LoginResponse = decode(expect_success(response).await?).await?;

        let tokens = AuthTokens { access_token: body.access_token, refresh_token: body.refresh_token };
        self.auth.sign_in(tokens, body.user.clone()).await;
        info!(username, "signed in");
        Ok(body.user)
    }

    /// Forget local credentials.
    pub async fn logout(&self) {
        self.auth.clear().await;
        info!("signed out");
    }

    // -------------------------------------------------------------------------
    // sessions
    // -------------------------------------------------------------------------

    /// One page of the signed-in user's chat sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error on auth, transport, status, or decode failure.
    pub async fn list_chats(&self, page: u32, page_size: u32) -> Result<Page<ChatSession>, ChatError> {
        let mut url = self.endpoint(&["api", "chats"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.max(1).to_string())
            .append_pair("page_size", &page_size.max(1).to_string());
        let response = self.send_authorized(|http| http.get(url.clone())).await?;
        decode(expect_success(response).await?).await
    }

    /// Persisted messages of one session.
    ///
    /// # Errors
    ///
    /// Returns an error on auth, transport, status, or decode failure.
    pub async fn chat_messages(&self, chat_id: &str) -> Result<Vec<Message>, ChatError> {
        let url = self.endpoint(&["api", "chats", chat_id, "messages"])?;
        let response = self.send_authorized(|http| http.get(url.clone())).await?;
        let body: HistoryBody = decode(expect_success(response).await?).await?;
        let history = match body {
            HistoryBody::List(items) | HistoryBody::Wrapped { messages: items } => items,
        };
        Ok(history.into_iter().map(Message::from).collect())
    }

    /// Delete a session and its history.
    ///
    /// # Errors
    ///
    /// Returns an error on auth, transport, or status failure.
    pub async fn delete_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        let url = self.endpoint(&["api", "chats", chat_id])?;
        let response = self.send_authorized(|http| http.delete(url.clone())).await?;
        expect_success(response).await?;
        info!(chat_id, "chat deleted");
        Ok(())
    }

    /// Model providers available for per-turn overrides.
    ///
    /// # Errors
    ///
    /// Returns an error on auth, transport, status, or decode failure.
    pub async fn list_providers(&self) -> Result<Vec<ModelProvider>, ChatError> {
        let url = self.endpoint(&["api", "model-providers"])?;
        let response = self.send_authorized(|http| http.get(url.clone())).await?;
        decode(expect_success(response).await?).await
    }

    // -------------------------------------------------------------------------
    // chat stream
    // -------------------------------------------------------------------------

    /// POST a chat turn and return the response body as raw chunks.
    ///
    /// # Errors
    ///
    /// Returns `Status` for non-2xx answers (before any frame is read) and
    /// `MissingBody` for an explicitly empty response.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let url = self.endpoint(&["api", "chat", "stream"])?;
        let response = self
            .send_authorized_on(&self.stream_http, |http| {
                http.post(url.clone())
                    .header(reqwest::header::ACCEPT, "text/event-stream")
                    .json(request)
            })
            .await?;
        let response = expect_success(response).await?;
        if response.content_length() == Some(0) {
            return Err(ChatError::MissingBody);
        }
        debug!(chat_id = ?request.chat_id, "chat stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(transport));
        Ok(stream.boxed())
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    /// Resolve `segments` under the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ChatError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ChatError::Config(format!("base URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_authorized<F>(&self, build: F) -> Result<Response, ChatError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send_authorized_on(&self.http, build).await
    }

    async fn send_authorized_on<F>(&self, http: &Client, build: F) -> Result<Response, ChatError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.auth.access_token().await.ok_or(ChatError::Unauthenticated)?;
        let response = build(http).bearer_auth(&token).send().await.map_err(transport)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("access token rejected; refreshing");
        let token = self.refresh(&token).await?;
        let response = build(http).bearer_auth(&token).send().await.map_err(transport)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("request still unauthorized after refresh; clearing credentials");
            self.auth.clear().await;
            return Err(ChatError::SessionExpired);
        }
        Ok(response)
    }

    /// Obtain a new access token. `rejected` is the token that just failed;
    /// if another task already replaced it, that newer token is reused.
    async fn refresh(&self, rejected: &str) -> Result<String, ChatError> {
        let _guard = self.refresh_lock.lock().await;

        match self.auth.access_token().await {
            Some(current) if current != rejected => return Ok(current),
            Some(_) => {}
            None => return Err(ChatError::SessionExpired),
        }

        let Some(refresh_token) = self.auth.refresh_token().await else {
            warn!("no refresh token available; clearing credentials");
            self.auth.clear().await;
            return Err(ChatError::SessionExpired);
        };

        let url = self.endpoint(&["api", "auth", "refresh"])?;
        let outcome = self
            .http
            .post(url)
            .json(&RefreshRequest { refresh_token: &refresh_token })
            .send()
            .await;

        let body = match outcome {
            Ok(response) if response.status().is_success() => response.json::<RefreshResponse>().await.ok(),
            Ok(response) => {
                warn!(status = response.status().as_u16(), "token refresh rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "token refresh request failed");
                None
            }
        };

        let Some(body) = body else {
            self.auth.clear().await;
            return Err(ChatError::SessionExpired);
        };

        self.auth
            .rotate(body.access_token.clone(), body.refresh_token)
            .await;
        info!("access token refreshed");
        Ok(body.access_token)
    }
}

#[async_trait::async_trait]
impl ChatBackend for ApiClient {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        self.chat_stream(request).await
    }

    async fn load_messages(&self, chat_id: &str) -> Result<Vec<Message>, ChatError> {
        self.chat_messages(chat_id).await
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn transport(e: reqwest::Error) -> ChatError {
    ChatError::Transport(e.to_string())
}

async fn expect_success(response: Response) -> Result<Response, ChatError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Status { status: status.as_u16(), body })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ChatError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ChatError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
