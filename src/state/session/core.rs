use super::super::event::SessionEvent;
use super::state::{lock, ChatSession, SendOutcome, TurnGuard};
use crate::api::FrameReader;
use crate::error::ChatError;
use crate::types::Message;
use chrono::{SecondsFormat, Utc};

impl ChatSession {
    /// Runs one chat turn: appends the user message, streams the reply into a
    /// trailing assistant message, and settles the loading flags on every path.
    pub async fn send_message(&self, content: &str) -> SendOutcome {
        let content = content.trim();
        if content.is_empty() || self.shutdown.is_cancelled() {
            return SendOutcome::Rejected;
        }

        let token = self.tokens.get().filter(|t| !t.trim().is_empty());

        // Check-and-set of `is_loading` happens under one lock, with no await.
        let (token, generation, turn_cancel) = {
            let mut state = lock(&self.state);
            if state.is_loading {
                tracing::debug!("dropping send while another turn is in flight");
                return SendOutcome::Rejected;
            }

            let Some(token) = token else {
                let message = self.locale.login_required().to_string();
                state.set_error(Some(message.clone()));
                drop(state);
                self.emit(SessionEvent::Error(message));
                self.emit(SessionEvent::AuthExpired);
                return SendOutcome::Failed;
            };

            state.push_message(Message::user(content, Some(now_timestamp())));
            state.input.clear();
            state.is_loading = true;
            state.is_typing = true;
            state.error = None;
            let turn_cancel = self.shutdown.child_token();
            state.active_turn = Some(turn_cancel.clone());
            (token, state.generation, turn_cancel)
        };
        let _guard = TurnGuard::new(self);
        self.emit(SessionEvent::TurnStarted);
        self.emit(SessionEvent::Typing(true));

        let opened = tokio::select! {
            biased;
            _ = turn_cancel.cancelled() => return self.finish_cancelled(generation),
            opened = self.backend.open_chat_stream(&token, content) => opened,
        };

        let stream = match opened {
            Ok(stream) => stream,
            Err(error) => return self.fail_turn(generation, error),
        };

        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                return SendOutcome::Superseded;
            }
            // Placeholder the UI can hang the typing indicator on.
            state.push_message(Message::assistant(""));
        }

        self.stream_reply(FrameReader::new(stream), generation, &turn_cancel)
            .await
    }

    /// Surfaces a failed turn: error text, a fallback reply, and for a
    /// rejected token the auth-expired notification.
    pub(super) fn fail_turn(&self, generation: u64, error: ChatError) -> SendOutcome {
        let auth_failed = error.is_auth();
        let message = if auth_failed {
            self.locale.auth_required()
        } else {
            self.locale.send_failed()
        }
        .to_string();

        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                return SendOutcome::Superseded;
            }
            state.remove_empty_reply();
            state.push_message(Message::assistant(self.locale.fallback_reply()));
            state.set_error(Some(message.clone()));
        }

        tracing::warn!(%error, "chat turn failed");
        if auth_failed {
            self.forget_token();
            self.emit(SessionEvent::AuthExpired);
        }
        self.emit(SessionEvent::Error(message));
        SendOutcome::Failed
    }

    pub(super) fn finish_cancelled(&self, generation: u64) -> SendOutcome {
        let mut state = lock(&self.state);
        if state.generation != generation {
            return SendOutcome::Superseded;
        }
        state.remove_empty_reply();
        tracing::debug!("chat turn cancelled");
        SendOutcome::Cancelled
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
