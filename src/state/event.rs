/// Notifications a chat session emits to whatever hosts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A user message was accepted and the request is going out.
    TurnStarted,
    /// Typing indicator changed.
    Typing(bool),
    /// New reply text, exactly as it arrived.
    Fragment(String),
    /// The turn settled (any outcome); loading and typing are both off.
    TurnComplete,
    /// A user-visible error was set.
    Error(String),
    /// The token is missing or was rejected; the host should send the user to login.
    AuthExpired,
    HistoryLoaded(usize),
    Cleared,
}
