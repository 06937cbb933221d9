//! Anthropic Messages API adapter.
//!
//! The normalized message and tool-schema types serialize directly to the
//! Messages API shapes, so this adapter is a thin HTTP layer: build the
//! request body, post it, deserialize the normalized response back out.

use serde::Deserialize;
use serde_json::json;
use toolgate_core::{ContentBlock, ModelResponse, StopReason};

use super::{Provider, ProviderError, ProviderRequest};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct ApiMessage {
    stop_reason: StopReason,
    content: Vec<ContentBlock>,
}

pub struct AnthropicProvider {
    runtime: tokio::runtime::Runtime,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    /// Build the adapter from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env(base_url: Option<String>) -> Result<Self, ProviderError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            ProviderError::MissingCredentials("ANTHROPIC_API_KEY is not set".to_string())
        })?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| ProviderError::Runtime(e.to_string()))?;
        Ok(Self {
            runtime,
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }
}

impl Provider for AnthropicProvider {
    fn create_message(&self, request: ProviderRequest<'_>) -> Result<ModelResponse, ProviderError> {
        let mut body = json!({
            "model": request.model,
            "system": request.system,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::to_value(request.tools)
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        }

        self.runtime.block_on(async {
            let response = self
                .client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::Http(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(ProviderError::Http(format!(
                    "API returned {status}: {detail}"
                )));
            }

            let parsed: ApiMessage = response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            Ok(ModelResponse {
                stop_reason: parsed.stop_reason,
                content: parsed.content,
            })
        })
    }
}
