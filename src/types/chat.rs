use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Anything that is not explicitly a user turn renders as the assistant.
    fn from_wire(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("user") {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }
}

/// Body of `POST /message_chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

/// JSON payload of one `data: ` line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClearResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ClearResponse {
    /// A missing `success` field counts as success; only an explicit `false` fails.
    pub fn succeeded(&self) -> bool {
        self.success.unwrap_or(true)
    }
}

/// The two shapes `GET /conversation_history` is known to return.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryPayload {
    List(Vec<Value>),
    Envelope {
        #[serde(default)]
        messages: Option<Vec<Value>>,
    },
}

/// Normalizes a history response into the canonical message list.
pub fn normalize_history(payload: Value) -> Result<Vec<Message>> {
    let entries = match serde_json::from_value::<HistoryPayload>(payload) {
        Ok(HistoryPayload::List(entries)) => entries,
        Ok(HistoryPayload::Envelope { messages }) => messages.unwrap_or_default(),
        Err(_) => {
            return Err(ChatError::Decode(
                "history must be an array or an object with a `messages` array".to_string(),
            ))
        }
    };

    Ok(entries.iter().filter_map(message_from_value).collect())
}

fn message_from_value(value: &Value) -> Option<Message> {
    let object = value.as_object()?;
    let role = object
        .get("role")
        .and_then(Value::as_str)
        .map(Role::from_wire)
        .unwrap_or(Role::Assistant);
    let content = object.get("content").map(scalar_to_string).unwrap_or_default();
    let timestamp = object
        .get("timestamp")
        .filter(|v| !v.is_null())
        .map(scalar_to_string);

    Some(Message {
        role,
        content,
        timestamp,
    })
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
