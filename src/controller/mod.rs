//! Chat controller — drives streaming turns and session switches.
//!
//! DESIGN
//! ======
//! `ChatController` is a cheap `Clone` handle. Conversation state lives in a
//! `tokio::sync::watch` channel: views `subscribe()` and re-render on change,
//! and every mutation goes through `send_if_modified` so each one is atomic
//! and observed. A turn appends the user message and an empty AI placeholder,
//! opens the stream through [`ChatBackend`], and folds each decoded frame into
//! the placeholder until `[DONE]`.
//!
//! CONCURRENCY
//! ===========
//! One turn in flight per controller; a send while loading is ignored.
//! Cancellation is a per-turn `watch<bool>` raced with `select!` against the
//! request open and every body read. Session switches and resets bump the
//! state epoch and cancel the active turn, so frames that arrive for a
//! session the user has left are dropped instead of written.
//!
//! ERROR HANDLING
//! ==============
//! Malformed frames are logged and skipped. Transport and status failures
//! replace the AI message with a fixed apology, notify the observer, and are
//! returned to the caller. Cancellation is an outcome, not an error.

pub mod state;
mod turn;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{ChatBackend, ChatRequest, SendOptions};
use crate::stream::{SseDecoder, StreamEvent, StreamFrame, parse_payload};
use crate::types::{ChatError, Message};
pub use state::{ChatState, SessionRef};
use turn::TurnAccumulator;

// =============================================================================
// OBSERVER
// =============================================================================

/// Collaborator notified of session-level events, typically the session
/// list (reload on create/rename) and the caller's error handler.
pub trait ChatObserver: Send + Sync {
    /// The stream assigned a new server session id.
    fn session_created(&self, _chat_id: &str) {}

    /// The stream delivered a title for the current session.
    fn title_updated(&self, _chat_id: Option<&str>, _title: &str) {}

    /// A turn failed for a reason other than cancellation.
    fn turn_failed(&self, _error: &ChatError) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl ChatObserver for NoopObserver {}

// =============================================================================
// TYPES
// =============================================================================

/// How a turn ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// `[DONE]` (or end of body) reached.
    Completed,
    /// Aborted by the user; partial content kept.
    Cancelled,
    /// The user switched or reset the session mid-turn; late frames dropped.
    Superseded,
    /// A turn was already in flight; nothing sent.
    Busy,
    /// Empty input; nothing sent.
    Skipped,
}

enum TurnInput {
    Fresh(String),
    Replay,
}

#[derive(Clone, Copy)]
enum Settle {
    Completed,
    Cancelled,
}

enum Step {
    Continue,
    Stop(TurnOutcome),
}

struct Started {
    ai_id: Uuid,
    epoch: u64,
    text: String,
    chat_id: Option<String>,
}

struct ActiveTurn {
    ai_id: Uuid,
    cancel: watch::Sender<bool>,
}

struct Inner {
    backend: Arc<dyn ChatBackend>,
    observer: Arc<dyn ChatObserver>,
    user_id: String,
    state: watch::Sender<ChatState>,
    active: Mutex<Option<ActiveTurn>>,
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Clone)]
pub struct ChatController {
    inner: Arc<Inner>,
}

impl ChatController {
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, observer: Arc<dyn ChatObserver>, user_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ChatState::default());
        Self {
            inner: Arc::new(Inner { backend, observer, user_id: user_id.into(), state, active: Mutex::new(None) }),
        }
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> ChatState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    // -------------------------------------------------------------------------
    // turns
    // -------------------------------------------------------------------------

    /// Send one user message and stream the reply into state.
    ///
    /// # Errors
    ///
    /// Returns the transport/status error after degrading the AI message to
    /// the apology text and notifying the observer.
    pub async fn send_message(&self, text: &str, options: SendOptions) -> Result<TurnOutcome, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty message");
            return Ok(TurnOutcome::Skipped);
        }
        self.run(TurnInput::Fresh(text.to_string()), options).await
    }

    /// Drop the last exchange and send its user message again.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::NothingToRegenerate`] when no user message
    /// exists, otherwise the same errors as [`Self::send_message`].
    pub async fn regenerate_last_message(&self, options: SendOptions) -> Result<TurnOutcome, ChatError> {
        self.run(TurnInput::Replay, options).await
    }

    /// Cancel the in-flight turn. Returns `false` when nothing is running.
    pub fn abort(&self) -> bool {
        let active = self.active();
        match active.as_ref() {
            Some(turn) => {
                debug!(message_id = %turn.ai_id, "abort requested");
                turn.cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    // -------------------------------------------------------------------------
    // sessions
    // -------------------------------------------------------------------------

    /// Attach to an existing server session and load its history.
    ///
    /// # Errors
    ///
    /// Returns the backend error if history cannot be loaded; the switch
    /// itself has already happened.
    pub async fn switch_chat(&self, chat_id: &str) -> Result<(), ChatError> {
        self.cancel_in_flight();
        // One atomic update: observers never see the new id next to old messages.
        self.inner
            .state
            .send_modify(|s| s.reset(SessionRef::Server(chat_id.to_owned())));
        info!(chat_id, "switched chat");
        self.load_history().await
    }

    /// Reset to an empty, session-less conversation.
    pub fn clear_messages(&self) {
        self.cancel_in_flight();
        self.inner.state.send_modify(|s| s.reset(SessionRef::None));
        debug!("conversation cleared");
    }

    /// Start a fresh conversation under a local placeholder id.
    pub fn new_chat(&self) {
        self.cancel_in_flight();
        self.inner.state.send_modify(|s| s.reset(SessionRef::local()));
        debug!("new local chat");
    }

    /// Load persisted messages for the current server session.
    ///
    /// Sessions created by this controller's own stream are skipped: their
    /// messages are already local.
    ///
    /// # Errors
    ///
    /// Returns the backend error on failure.
    pub async fn load_history(&self) -> Result<(), ChatError> {
        let (chat_id, epoch, known) = {
            let s = self.inner.state.borrow();
            match s.session.server_id() {
                Some(id) if !s.is_new_chat => (id.to_owned(), s.epoch, s.messages.len()),
                _ => return Ok(()),
            }
        };

        let history = self.inner.backend.load_messages(&chat_id).await?;
        let count = history.len();
        let applied = self.inner.state.send_if_modified(|s| {
            if s.epoch != epoch {
                return false;
            }
            // History replaces what was already shown; only messages sent
            // while the load was in flight survive, after it.
            let mut previous = std::mem::replace(&mut s.messages, history);
            let pending = previous.split_off(known.min(previous.len()));
            s.messages.extend(pending);
            true
        });

        if applied {
            debug!(chat_id, count, "history loaded");
        } else {
            debug!(chat_id, "history discarded; session changed while loading");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    fn active(&self) -> MutexGuard<'_, Option<ActiveTurn>> {
        self.inner.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_in_flight(&self) {
        if let Some(turn) = self.active().take() {
            debug!(message_id = %turn.ai_id, "cancelling turn for session change");
            turn.cancel.send_replace(true);
        }
    }

    async fn run(&self, input: TurnInput, options: SendOptions) -> Result<TurnOutcome, ChatError> {
        let Some((turn, cancel_rx)) = self.begin(input)? else {
            debug!("turn already in flight; ignoring send");
            return Ok(TurnOutcome::Busy);
        };

        let request = ChatRequest {
            message: turn.text.clone(),
            chat_id: turn.chat_id.clone(),
            user_id: self.inner.user_id.clone(),
            stream: true,
            provider_id: options.provider_id,
            model_name: options.model_name,
        };
        info!(chat_id = ?request.chat_id, model = ?request.model_name, "chat turn started");

        let mut acc = TurnAccumulator::default();
        let result = self.stream_turn(&request, &turn, &mut acc, cancel_rx).await;

        {
            let mut active = self.active();
            if active.as_ref().is_some_and(|a| a.ai_id == turn.ai_id) {
                *active = None;
            }
        }

        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => self.fail(&turn, err),
        }
    }

    /// Append the user/AI pair, mark loading, and register the turn's cancel
    /// flag, atomically. `None` when a turn is already in flight.
    fn begin(&self, input: TurnInput) -> Result<Option<(Started, watch::Receiver<bool>)>, ChatError> {
        let mut started = None;
        let mut nothing_to_replay = false;

        self.inner.state.send_if_modified(|s| {
            if s.is_loading {
                return false;
            }
            let text = match input {
                TurnInput::Fresh(text) => text,
                TurnInput::Replay => {
                    let Some(idx) = s.last_user_index() else {
                        nothing_to_replay = true;
                        return false;
                    };
                    let text = s.messages[idx].content.clone();
                    s.messages.truncate(idx);
                    text
                }
            };

            let ai = Message::ai_placeholder();
            // Registered before the change is published so a subscriber
            // reacting to `is_loading` can already abort.
            let (cancel_tx, cancel_rx) = watch::channel(false);
            *self.active() = Some(ActiveTurn { ai_id: ai.id, cancel: cancel_tx });
            started = Some((
                Started {
                    ai_id: ai.id,
                    epoch: s.epoch,
                    text: text.clone(),
                    chat_id: s.session.server_id().map(str::to_owned),
                },
                cancel_rx,
            ));
            s.messages.push(Message::user(text));
            s.messages.push(ai);
            s.is_loading = true;
            true
        });

        if nothing_to_replay {
            return Err(ChatError::NothingToRegenerate);
        }
        Ok(started)
    }

    async fn stream_turn(
        &self,
        request: &ChatRequest,
        turn: &Started,
        acc: &mut TurnAccumulator,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<TurnOutcome, ChatError> {
        let mut body = tokio::select! {
            biased;
            () = cancelled(&mut cancel) => return Ok(self.settle(turn, acc, Settle::Cancelled)),
            opened = self.inner.backend.open_stream(request) => opened?,
        };

        let mut decoder = SseDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                () = cancelled(&mut cancel) => return Ok(self.settle(turn, acc, Settle::Cancelled)),
                next = body.next() => next,
            };

            let ended = next.is_none();
            let payloads = match next {
                Some(chunk) => decoder.push(&chunk?),
                None => decoder.finish().into_iter().collect(),
            };
            for payload in payloads {
                if let Step::Stop(outcome) = self.apply_payload(&payload, turn, acc) {
                    return Ok(outcome);
                }
            }
            if ended {
                break;
            }
        }

        debug!("stream ended without [DONE]; completing turn");
        Ok(self.settle(turn, acc, Settle::Completed))
    }

    fn apply_payload(&self, payload: &str, turn: &Started, acc: &mut TurnAccumulator) -> Step {
        match parse_payload(payload) {
            Ok(StreamEvent::Done) => Step::Stop(self.settle(turn, acc, Settle::Completed)),
            Ok(StreamEvent::Frame(frame)) => self.apply_frame(&frame, turn, acc),
            Err(e) => {
                warn!(error = %e, payload, "skipping malformed stream frame");
                Step::Continue
            }
        }
    }

    fn apply_frame(&self, frame: &StreamFrame, turn: &Started, acc: &mut TurnAccumulator) -> Step {
        let now = Instant::now();
        let mut stale = false;
        let mut created = None;
        let mut retitled = None;

        self.inner.state.send_if_modified(|s| {
            if s.epoch != turn.epoch {
                stale = true;
                return false;
            }
            let mut changed = false;

            if let Some(id) = frame.chat_id() {
                if !acc.chat_id_recorded {
                    acc.chat_id_recorded = true;
                    if s.session.server_id() != Some(id) {
                        s.session = SessionRef::Server(id.to_owned());
                        s.is_new_chat = true;
                        created = Some(id.to_owned());
                        changed = true;
                    }
                }
            }

            if let Some(title) = frame.title() {
                s.title = Some(title.to_owned());
                retitled = Some((s.session.server_id().map(str::to_owned), title.to_owned()));
                changed = true;
            }

            if let Some(message) = s.message_mut(turn.ai_id) {
                if let Some(reasoning) = frame.reasoning() {
                    acc.on_reasoning(reasoning, message, now);
                    changed = true;
                }
                if let Some(content) = frame.content() {
                    acc.on_content(content, message, now);
                    changed = true;
                }
            }
            changed
        });

        if stale {
            debug!("dropping frame for a session the user left");
            return Step::Stop(TurnOutcome::Superseded);
        }
        if let Some(chat_id) = created {
            info!(%chat_id, "session created by stream");
            self.inner.observer.session_created(&chat_id);
        }
        if let Some((chat_id, title)) = retitled {
            debug!(?chat_id, %title, "session title updated");
            self.inner.observer.title_updated(chat_id.as_deref(), &title);
        }
        Step::Continue
    }

    fn settle(&self, turn: &Started, acc: &mut TurnAccumulator, settle: Settle) -> TurnOutcome {
        let now = Instant::now();
        let mut stale = false;

        self.inner.state.send_if_modified(|s| {
            if s.epoch != turn.epoch {
                stale = true;
                return false;
            }
            if let Some(message) = s.message_mut(turn.ai_id) {
                match settle {
                    Settle::Completed => acc.finish(message, now),
                    Settle::Cancelled => acc.cancel(message, now),
                }
            }
            s.is_loading = false;
            true
        });

        if stale {
            return TurnOutcome::Superseded;
        }
        match settle {
            Settle::Completed => {
                info!("chat turn completed");
                TurnOutcome::Completed
            }
            Settle::Cancelled => {
                info!("chat turn cancelled");
                TurnOutcome::Cancelled
            }
        }
    }

    fn fail(&self, turn: &Started, err: ChatError) -> Result<TurnOutcome, ChatError> {
        let mut stale = false;
        self.inner.state.send_if_modified(|s| {
            if s.epoch != turn.epoch {
                stale = true;
                return false;
            }
            if let Some(message) = s.message_mut(turn.ai_id) {
                TurnAccumulator::fail(message);
            }
            s.is_loading = false;
            true
        });

        if stale {
            debug!(error = %err, "turn failed after the session changed; ignoring");
            return Ok(TurnOutcome::Superseded);
        }
        warn!(error = %err, code = err.error_code(), "chat turn failed");
        self.inner.observer.turn_failed(&err);
        Err(err)
    }
}

/// Resolves once the turn's cancel flag is raised. A dropped sender means
/// the turn can no longer be cancelled, so this then never resolves.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|flag| *flag).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
