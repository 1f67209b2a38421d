use reqwest::StatusCode;

/// Failures surfaced by the transport, the frame decoder and the token store.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("authentication required")]
    AuthRequired,

    #[error("API returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("{0}")]
    Transport(String),

    #[error("stream failed: {0}")]
    Stream(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("token store error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ChatError::AuthRequired)
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(error: serde_json::Error) -> Self {
        ChatError::Decode(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
