use super::super::event::SessionEvent;
use crate::api::ChatBackend;
use crate::auth::TokenStore;
use crate::locale::Locale;
use crate::types::{Message, Role};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How a `send_message` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, a turn already in flight, or the session was shut down.
    Rejected,
    /// The reply streamed to the end.
    Completed,
    /// No token, transport failure, or a fatal stream error; see `error`.
    Failed,
    /// `cancel_turn` or `shutdown` stopped the reply.
    Cancelled,
    /// History was cleared or reloaded mid-turn; the reply was discarded.
    Superseded,
}

/// Point-in-time copy of the session for rendering.
///
/// `messages` is replaced, never mutated, on every change, so
/// `Arc::ptr_eq` between two snapshots tells whether the list changed.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub messages: Arc<Vec<Message>>,
    pub input: String,
    pub is_loading: bool,
    pub is_typing: bool,
    pub error: Option<String>,
    pub revision: u64,
}

pub(super) struct SessionState {
    pub(super) messages: Arc<Vec<Message>>,
    pub(super) input: String,
    pub(super) is_loading: bool,
    pub(super) is_typing: bool,
    pub(super) error: Option<String>,
    pub(super) revision: u64,
    /// Bumped whenever the message list is replaced wholesale; a turn that
    /// started under an older generation must not touch the list again.
    pub(super) generation: u64,
    pub(super) active_turn: Option<CancellationToken>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            messages: Arc::new(Vec::new()),
            input: String::new(),
            is_loading: false,
            is_typing: false,
            error: None,
            revision: 0,
            generation: 0,
            active_turn: None,
        }
    }

    pub(super) fn touch(&mut self) {
        self.revision += 1;
    }

    pub(super) fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = Arc::new(messages);
        self.touch();
    }

    pub(super) fn push_message(&mut self, message: Message) {
        let mut next = Vec::with_capacity(self.messages.len() + 1);
        next.extend_from_slice(&self.messages);
        next.push(message);
        self.replace_messages(next);
    }

    /// Sets the reply text on the trailing assistant entry.
    pub(super) fn set_reply_content(&mut self, content: &str) {
        let mut next: Vec<Message> = self.messages.as_ref().clone();
        match next.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content = content.to_string(),
            _ => next.push(Message::assistant(content)),
        }
        self.replace_messages(next);
    }

    /// Drops a trailing assistant entry that never received any text.
    pub(super) fn remove_empty_reply(&mut self) {
        let is_empty_reply = self
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant && m.content.is_empty());
        if is_empty_reply {
            let mut next = self.messages.as_ref().clone();
            next.pop();
            self.replace_messages(next);
        }
    }

    pub(super) fn set_error(&mut self, error: Option<String>) {
        self.error = error;
        self.touch();
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: Arc::clone(&self.messages),
            input: self.input.clone(),
            is_loading: self.is_loading,
            is_typing: self.is_typing,
            error: self.error.clone(),
            revision: self.revision,
        }
    }
}

pub(super) fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Controller for one chat conversation.
///
/// Cloning yields another handle to the same session. State lives behind a
/// mutex that is never held across an `.await`.
#[derive(Clone)]
pub struct ChatSession {
    pub(super) backend: Arc<dyn ChatBackend>,
    pub(super) tokens: Arc<dyn TokenStore>,
    pub(super) locale: Locale,
    pub(super) state: Arc<Mutex<SessionState>>,
    pub(super) events: Option<mpsc::UnboundedSender<SessionEvent>>,
    pub(super) shutdown: CancellationToken,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            backend,
            tokens,
            locale: Locale::default(),
            state: Arc::new(Mutex::new(SessionState::new())),
            events: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_event_sink(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.state).snapshot()
    }

    pub fn messages(&self) -> Arc<Vec<Message>> {
        Arc::clone(&lock(&self.state).messages)
    }

    pub fn input(&self) -> String {
        lock(&self.state).input.clone()
    }

    pub fn set_input(&self, input: impl Into<String>) {
        let mut state = lock(&self.state);
        state.input = input.into();
        state.touch();
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).is_loading
    }

    pub fn is_typing(&self) -> bool {
        lock(&self.state).is_typing
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Stops the reply currently streaming, if any.
    pub fn cancel_turn(&self) -> bool {
        match &lock(&self.state).active_turn {
            Some(turn) => {
                turn.cancel();
                true
            }
            None => false,
        }
    }

    /// Tears the session down: the active reply stops and later sends are rejected.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(super) fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Drops the stored token after the server rejected it.
    pub(super) fn forget_token(&self) {
        if let Err(error) = self.tokens.clear() {
            tracing::warn!(%error, "failed to clear rejected token");
        }
    }
}

/// Resets the in-flight flags when a turn ends, however it ends.
pub(super) struct TurnGuard {
    state: Arc<Mutex<SessionState>>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl TurnGuard {
    pub(super) fn new(session: &ChatSession) -> Self {
        Self {
            state: Arc::clone(&session.state),
            events: session.events.clone(),
        }
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let was_typing = {
            let mut state = lock(&self.state);
            let was_typing = state.is_typing;
            state.is_loading = false;
            state.is_typing = false;
            state.active_turn = None;
            state.touch();
            was_typing
        };

        if let Some(events) = &self.events {
            if was_typing {
                let _ = events.send(SessionEvent::Typing(false));
            }
            let _ = events.send(SessionEvent::TurnComplete);
        }
    }
}
