use super::backend::{ByteStream, ChatBackend};
use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::auth::TokenStore;
use crate::config::Config;
use crate::error::{ChatError, Result};
use crate::types::{ChatRequest, ClearResponse};
use crate::util::{endpoint_url, is_local_endpoint_url, token_preview};
use futures::future::BoxFuture;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub(super) const MESSAGE_CHAT_ENDPOINT: &str = "/message_chat";
pub(super) const HISTORY_ENDPOINT: &str = "/conversation_history";
pub(super) const CLEAR_ENDPOINT: &str = "/clear";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const LOCAL_UNREACHABLE_HINT: &str =
    "Start the API server or update ALWAYSCHAT_API_BASE_URL.";

/// HTTP client for the chat and financial API.
#[derive(Clone)]
pub struct ApiClient {
    pub(super) http: reqwest::Client,
    pub(super) base_url: String,
    pub(super) token_store: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(config: &Config, token_store: Arc<dyn TokenStore>) -> Result<Self> {
        Self::build(&config.api_base_url, config.connect_timeout, token_store)
    }

    /// Client with default timeouts, mainly for tests and embedding.
    pub fn with_base_url(
        base_url: impl Into<String>,
        token_store: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        Self::build(&base_url.into(), DEFAULT_CONNECT_TIMEOUT, token_store)
    }

    fn build(
        base_url: &str,
        connect_timeout: Duration,
        token_store: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        // No overall timeout: chat replies stream for as long as the model writes.
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|error| ChatError::Transport(format!("cannot build HTTP client: {error}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.token_store)
    }

    pub(super) fn url(&self, endpoint: &str) -> String {
        endpoint_url(&self.base_url, endpoint)
    }

    /// Sends the request and maps 401 and other non-OK statuses to errors.
    pub(super) async fn dispatch(
        &self,
        request: RequestBuilder,
        request_url: &str,
    ) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|error| map_api_request_error(error, request_url))?;
        check_status(response, request_url).await
    }

    async fn open_stream(&self, token: &str, message: &str) -> Result<ByteStream> {
        let request_url = self.url(MESSAGE_CHAT_ENDPOINT);
        let payload = ChatRequest { message };

        if debug_payload_enabled() {
            let payload_value = serde_json::to_value(&payload).unwrap_or(Value::Null);
            emit_debug_payload(&request_url, &payload_value);
        }
        tracing::debug!(url = %request_url, token = %token_preview(Some(token)), "opening chat stream");

        let request = self.http.post(&request_url).bearer_auth(token).json(&payload);
        let response = self.dispatch(request, &request_url).await?;

        let request_url_for_stream = request_url.clone();
        let stream = response.bytes_stream().map(move |item| {
            item.map_err(|error| {
                ChatError::Stream(format!(
                    "reading response from '{request_url_for_stream}' failed: {error}"
                ))
            })
        });
        Ok(Box::pin(stream))
    }

    async fn history(&self, token: &str) -> Result<Value> {
        let request_url = self.url(HISTORY_ENDPOINT);
        tracing::debug!(url = %request_url, token = %token_preview(Some(token)), "fetching chat history");

        let request = self.http.get(&request_url).bearer_auth(token);
        let response = self.dispatch(request, &request_url).await?;
        response
            .json::<Value>()
            .await
            .map_err(|error| ChatError::Decode(format!("history from '{request_url}': {error}")))
    }

    async fn clear(&self, token: &str) -> Result<ClearResponse> {
        let request_url = self.url(CLEAR_ENDPOINT);
        tracing::debug!(url = %request_url, token = %token_preview(Some(token)), "clearing chat history");

        let request = self.http.post(&request_url).bearer_auth(token);
        let response = self.dispatch(request, &request_url).await?;
        let body = response
            .text()
            .await
            .map_err(|error| map_api_request_error(error, &request_url))?;

        if body.trim().is_empty() {
            return Ok(ClearResponse::default());
        }
        match serde_json::from_str::<ClearResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(error) => {
                tracing::debug!(%error, "clear response is not a JSON envelope; treating as success");
                Ok(ClearResponse::default())
            }
        }
    }
}

impl ChatBackend for ApiClient {
    fn open_chat_stream<'a>(
        &'a self,
        token: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<ByteStream>> {
        Box::pin(self.open_stream(token, message))
    }

    fn fetch_history<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Value>> {
        Box::pin(self.history(token))
    }

    fn clear_history<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<ClearResponse>> {
        Box::pin(self.clear(token))
    }
}

pub(super) async fn check_status(response: Response, request_url: &str) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        tracing::warn!(url = request_url, "API rejected the bearer token");
        return Err(ChatError::AuthRequired);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(url = request_url, %status, "API request failed");
        return Err(ChatError::Status { status, body });
    }
    Ok(response)
}

pub(super) fn map_api_request_error(error: reqwest::Error, request_url: &str) -> ChatError {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return ChatError::Transport(format!(
            "cannot reach local API endpoint '{request_url}': {error}. {LOCAL_UNREACHABLE_HINT}"
        ));
    }
    if error.is_connect() {
        return ChatError::Transport(format!("cannot reach API endpoint '{request_url}': {error}"));
    }
    if error.is_timeout() {
        return ChatError::Transport(format!("API request to '{request_url}' timed out: {error}"));
    }
    ChatError::Transport(format!("API request to '{request_url}' failed: {error}"))
}
