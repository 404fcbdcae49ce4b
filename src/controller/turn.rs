//! Per-turn accumulation of streamed fragments into the AI message.
//!
//! The accumulator holds the buffers and phase bookkeeping for one turn and
//! writes the result into the message after every fragment. Callers pass
//! the current instant so thinking durations are deterministic under test.

use std::time::Instant;

use crate::types::{FAILURE_MESSAGE, Message};

#[derive(Debug, Default)]
pub(crate) struct TurnAccumulator {
    content: String,
    thinking: String,
    thinking_started: Option<Instant>,
    thinking_closed: bool,
    /// A `chat_id` frame was already seen during this turn.
    pub(crate) chat_id_recorded: bool,
}

impl TurnAccumulator {
    pub(crate) fn on_reasoning(&mut self, delta: &str, message: &mut Message, now: Instant) {
        if self.thinking_started.is_none() {
            self.thinking_started = Some(now);
        }
        self.thinking.push_str(delta);
        message.thinking = Some(self.thinking.clone());
        // Reasoning that trails the first content fragment is kept but does
        // not reopen the thinking phase.
        message.is_thinking = !self.thinking_closed;
    }

    pub(crate) fn on_content(&mut self, delta: &str, message: &mut Message, now: Instant) {
        if !self.thinking_closed {
            self.close_thinking(message, now);
        }
        self.content.push_str(delta);
        message.content.clone_from(&self.content);
    }

    /// `[DONE]` or end of body: the message becomes immutable.
    pub(crate) fn finish(&mut self, message: &mut Message, now: Instant) {
        if !self.thinking_closed {
            self.close_thinking(message, now);
        }
        message.loading = false;
        message.is_thinking = false;
    }

    /// User abort: keep what arrived, stop the spinner.
    pub(crate) fn cancel(&mut self, message: &mut Message, now: Instant) {
        self.finish(message, now);
    }

    pub(crate) fn fail(message: &mut Message) {
        message.content = FAILURE_MESSAGE.to_string();
        message.loading = false;
        message.is_thinking = false;
    }

    fn close_thinking(&mut self, message: &mut Message, now: Instant) {
        self.thinking_closed = true;
        message.is_thinking = false;
        if let Some(started) = self.thinking_started {
            message.thinking_duration = Some(elapsed_secs(started, now));
        }
    }
}

/// Elapsed whole seconds, rounded to nearest.
pub(crate) fn elapsed_secs(started: Instant, now: Instant) -> u64 {
    let millis = now.saturating_duration_since(started).as_millis();
    u64::try_from((millis + 500) / 1000).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "turn_test.rs"]
mod tests;
