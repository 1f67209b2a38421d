use super::client::{map_api_request_error, HISTORY_ENDPOINT};
use super::ApiClient;
use crate::auth::Credentials;
use crate::error::{ChatError, Result};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TOKEN_ENDPOINT: &str = "/token";
const REGISTER_ENDPOINT: &str = "/register";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    /// Exchanges a username and password for tokens. Nothing is persisted here.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials> {
        let request_url = self.url(TOKEN_ENDPOINT);
        tracing::info!(url = %request_url, username, "logging in");

        let response = self
            .http
            .post(&request_url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;

        if !response.status().is_success() {
            return Err(rejection(response, "login failed").await);
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|error| ChatError::Decode(format!("token response: {error}")))?;
        let access_token = body
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ChatError::Decode("token response has no access_token".to_string()))?;

        Ok(Credentials {
            access_token,
            refresh_token: body.refresh_token,
            username: Some(username.to_string()),
        })
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<()> {
        let request_url = self.url(REGISTER_ENDPOINT);
        tracing::info!(url = %request_url, username, "registering account");

        let response = self
            .http
            .post(&request_url)
            .json(&RegisterRequest {
                username,
                email,
                password,
            })
            .send()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;

        if !response.status().is_success() {
            return Err(rejection(response, "registration failed").await);
        }
        Ok(())
    }

    /// Probes the history endpoint to see whether `token` is still accepted.
    pub async fn check_token(&self, token: &str) -> Result<bool> {
        let request_url = self.url(HISTORY_ENDPOINT);
        let request = self.http.get(&request_url).bearer_auth(token);
        match self.dispatch(request, &request_url).await {
            Ok(_) => Ok(true),
            Err(ChatError::AuthRequired) => Ok(false),
            Err(error) => Err(error),
        }
    }
}

/// Builds a `Rejected` error from the `detail` field the auth endpoints return.
async fn rejection(response: Response, fallback: &str) -> ChatError {
    let status = response.status();
    let detail = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| detail_message(&body));

    match detail {
        Some(detail) => ChatError::Rejected(detail),
        None if status == StatusCode::UNAUTHORIZED => {
            ChatError::Rejected(format!("{fallback}: invalid credentials"))
        }
        None => ChatError::Rejected(format!("{fallback} (HTTP {status})")),
    }
}

fn detail_message(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        // Validation errors arrive as a list of `{msg, ...}` objects.
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}
