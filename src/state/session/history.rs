use super::super::event::SessionEvent;
use super::state::{lock, ChatSession};
use crate::error::{ChatError, Result};
use crate::types::normalize_history;

impl ChatSession {
    /// Replaces the message log with the server's history.
    ///
    /// A missing or rejected token also emits `AuthExpired`; any other
    /// failure leaves the log empty.
    pub async fn load_chat_history(&self) -> Result<usize> {
        lock(&self.state).set_error(None);

        let Some(token) = self.tokens.get().filter(|t| !t.trim().is_empty()) else {
            self.surface_auth_failure(self.locale.login_required(), true);
            return Err(ChatError::AuthRequired);
        };

        let fetched = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(ChatError::Cancelled),
            fetched = self.backend.fetch_history(&token) => fetched,
        };

        match fetched.and_then(normalize_history) {
            Ok(messages) => {
                let count = messages.len();
                {
                    let mut state = lock(&self.state);
                    state.generation += 1;
                    state.replace_messages(messages);
                }
                tracing::debug!(count, "chat history loaded");
                self.emit(SessionEvent::HistoryLoaded(count));
                Ok(count)
            }
            Err(error) if error.is_auth() => {
                self.forget_token();
                self.surface_auth_failure(self.locale.auth_required(), true);
                Err(error)
            }
            Err(error) => {
                tracing::warn!(%error, "failed to load chat history");
                let message = self.locale.history_load_failed().to_string();
                {
                    let mut state = lock(&self.state);
                    state.generation += 1;
                    state.replace_messages(Vec::new());
                    state.set_error(Some(message.clone()));
                }
                self.emit(SessionEvent::Error(message));
                Err(error)
            }
        }
    }

    /// Clears the history on the server, then locally. Loading flags are untouched.
    pub async fn clear_chat(&self) -> Result<()> {
        lock(&self.state).set_error(None);

        let Some(token) = self.tokens.get().filter(|t| !t.trim().is_empty()) else {
            self.surface_auth_failure(self.locale.login_required(), false);
            return Err(ChatError::AuthRequired);
        };

        let cleared = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(ChatError::Cancelled),
            cleared = self.backend.clear_history(&token) => cleared,
        };

        let outcome = cleared.and_then(|response| {
            if response.succeeded() {
                Ok(())
            } else {
                Err(ChatError::Rejected(
                    response
                        .message
                        .unwrap_or_else(|| "server reported clear failure".to_string()),
                ))
            }
        });

        match outcome {
            Ok(()) => {
                {
                    let mut state = lock(&self.state);
                    // Any reply still streaming belongs to the old history.
                    state.generation += 1;
                    state.replace_messages(Vec::new());
                    state.error = None;
                }
                self.emit(SessionEvent::Cleared);
                Ok(())
            }
            Err(error) if error.is_auth() => {
                self.forget_token();
                self.surface_auth_failure(self.locale.auth_required(), false);
                Err(error)
            }
            Err(error) => {
                tracing::warn!(%error, "failed to clear chat history");
                let message = self.locale.clear_failed().to_string();
                lock(&self.state).set_error(Some(message.clone()));
                self.emit(SessionEvent::Error(message));
                Err(error)
            }
        }
    }

    fn surface_auth_failure(&self, message: &str, notify_expired: bool) {
        lock(&self.state).set_error(Some(message.to_string()));
        self.emit(SessionEvent::Error(message.to_string()));
        if notify_expired {
            self.emit(SessionEvent::AuthExpired);
        }
    }
}
