use super::logging::{debug_payload_enabled, emit_debug_payload};
use super::ApiClient;
use crate::error::{ChatError, Result};
use crate::types::{
    ApiEnvelope, CrmData, LifeplanResponse, PromptListResponse, PromptOption, StrategyData,
};
use crate::util::token_preview;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

const CRM_DATA_ENDPOINT: &str = "/financial/crm-data";
const SUBMIT_ENDPOINT: &str = "/financial/submit";
const STRATEGY_ENDPOINT: &str = "/financial/get-strategy";
const LIFEPLAN_ENDPOINT: &str = "/financial/generate-lifeplan";
const PROMPTS_ENDPOINT: &str = "/api/prompts";
const SELECT_PROMPT_ENDPOINT: &str = "/api/select-prompt";

impl ApiClient {
    pub async fn crm_data(&self, cif_id: &str) -> Result<ApiEnvelope<CrmData>> {
        let cif_id = cif_id.trim();
        if cif_id.is_empty() || cif_id.contains('/') {
            return Err(ChatError::Rejected(format!("invalid CIF id '{cif_id}'")));
        }
        self.request_json(Method::GET, &format!("{CRM_DATA_ENDPOINT}/{cif_id}"), None)
            .await
    }

    /// Submits the intake form; the generated strategy comes back in `strategy_data`.
    pub async fn submit_financial_data<T: Serialize>(
        &self,
        data: &T,
    ) -> Result<ApiEnvelope<StrategyData>> {
        let body = serde_json::to_value(data)?;
        self.request_json(Method::POST, SUBMIT_ENDPOINT, Some(body))
            .await
    }

    pub async fn strategy(&self) -> Result<ApiEnvelope<StrategyData>> {
        self.request_json(Method::GET, STRATEGY_ENDPOINT, None).await
    }

    pub async fn generate_lifeplan<T: Serialize>(&self, request: &T) -> Result<LifeplanResponse> {
        let body = serde_json::to_value(request)?;
        self.request_json(Method::POST, LIFEPLAN_ENDPOINT, Some(body))
            .await
    }

    /// Advisor prompts offered by the server, or the built-in default on any failure.
    pub async fn prompts(&self) -> Vec<PromptOption> {
        match self
            .request_json::<PromptListResponse>(Method::GET, PROMPTS_ENDPOINT, None)
            .await
        {
            Ok(PromptListResponse {
                success: true,
                prompts: Some(prompts),
            }) if !prompts.is_empty() => prompts.into_iter().map(PromptOption::from).collect(),
            Ok(_) => {
                tracing::warn!("prompt listing returned no prompts; using default advisor");
                vec![PromptOption::default_advisor()]
            }
            Err(error) => {
                tracing::warn!(%error, "prompt listing failed; using default advisor");
                vec![PromptOption::default_advisor()]
            }
        }
    }

    /// Stores the advisor prompt the server uses for this user's session.
    pub async fn select_prompt(&self, prompt_id: i64) -> Result<ApiEnvelope<Value>> {
        let body = serde_json::json!({ "prompt_id": prompt_id });
        self.request_json(Method::POST, SELECT_PROMPT_ENDPOINT, Some(body))
            .await
    }

    /// Authenticated JSON round trip. A 401 also drops the stored token.
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let request_url = self.url(endpoint);
        let token = self.token_store.get();
        tracing::debug!(
            %method,
            url = %request_url,
            token = %token_preview(token.as_deref()),
            "finance API request"
        );

        let mut request = self.http.request(method, &request_url);
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &body {
            if debug_payload_enabled() {
                emit_debug_payload(&request_url, body);
            }
            request = request.json(body);
        }

        let response = match self.dispatch(request, &request_url).await {
            Ok(response) => response,
            Err(ChatError::AuthRequired) => {
                if let Err(error) = self.token_store.clear() {
                    tracing::warn!(%error, "failed to drop rejected token");
                }
                return Err(ChatError::AuthRequired);
            }
            Err(error) => return Err(error),
        };

        response
            .json::<T>()
            .await
            .map_err(|error| ChatError::Decode(format!("response from '{request_url}': {error}")))
    }
}
