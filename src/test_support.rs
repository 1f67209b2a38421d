use crate::api::mock_client::ScriptedBackend;
use crate::auth::MemoryTokenStore;
use crate::state::{ChatSession, SessionEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

/// Process-wide lock for tests that mutate environment variables.
/// Use `.blocking_lock()` in sync tests and `.lock().await` in async tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

pub struct SessionHarness {
    pub session: ChatSession,
    pub backend: Arc<ScriptedBackend>,
    pub tokens: Arc<MemoryTokenStore>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionHarness {
    /// Session over a scripted backend with a stored token.
    pub fn logged_in() -> Self {
        Self::with_tokens(MemoryTokenStore::with_token("test-token"))
    }

    pub fn logged_out() -> Self {
        Self::with_tokens(MemoryTokenStore::new())
    }

    fn with_tokens(tokens: MemoryTokenStore) -> Self {
        let backend = Arc::new(ScriptedBackend::new());
        let tokens = Arc::new(tokens);
        let (tx, events) = mpsc::unbounded_channel();
        let session = ChatSession::new(backend.clone(), tokens.clone()).with_event_sink(tx);
        Self {
            session,
            backend,
            tokens,
            events,
        }
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}
