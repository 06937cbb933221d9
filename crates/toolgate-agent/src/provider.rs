//! Provider abstraction.
//!
//! The agent loop depends only on this contract: send the conversation so
//! far, get back a normalized response (stop reason + content blocks).
//! Provider implementations translate their native wire formats to and
//! from the normalized shape.

pub mod anthropic;

use thiserror::Error;
use toolgate_core::{Message, ModelResponse, ProviderConfig, ToolSchema};

/// One conversation turn sent to a model provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSchema],
    pub max_tokens: u32,
}

/// A model backend that can advance the conversation by one message.
pub trait Provider: Send {
    fn create_message(&self, request: ProviderRequest<'_>) -> Result<ModelResponse, ProviderError>;
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider credentials missing: {0}")]
    MissingCredentials(String),

    #[error("provider request failed: {0}")]
    Http(String),

    #[error("provider returned a malformed response: {0}")]
    Malformed(String),

    #[error("unknown provider type '{0}'; valid values: 'anthropic'")]
    Unknown(String),

    #[error("failed to create provider runtime: {0}")]
    Runtime(String),
}

/// Instantiate a provider from agent config. Omitting the `provider` block
/// (or setting `type: anthropic`) uses the Anthropic API.
pub fn build_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>, ProviderError> {
    match config.kind.as_str() {
        "anthropic" => Ok(Box::new(anthropic::AnthropicProvider::from_env(
            config.base_url.clone(),
        )?)),
        other => Err(ProviderError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_type_rejected() {
        let config = ProviderConfig {
            kind: "vertex_ai".to_string(),
            base_url: None,
        };
        assert!(matches!(
            build_provider(&config),
            Err(ProviderError::Unknown(_))
        ));
    }
}
