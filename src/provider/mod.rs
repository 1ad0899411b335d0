//! Language model provider seam.

pub mod http;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::LlmSettings;
use crate::error::{DeskError, Result};
use crate::types::{AgentToolCall, FinishReason, GenerationSettings, ModelMessage, TextStreamDelta, Usage};

pub use openai::OpenAiProvider;

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<AgentToolCall>,
    pub finish_reason: Option<FinishReason>,
}

/// Core trait implemented by model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g. "openai", "together").
    fn provider_name(&self) -> &str;

    fn model_id(&self) -> &str;

    /// Generate a complete response, possibly containing tool calls.
    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse>;

    /// Stream text deltas.
    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta>>>;
}

/// Build the configured provider.
pub fn create_provider(settings: &LlmSettings) -> Result<Arc<dyn ModelProvider>> {
    let api_key = settings.api_key.clone().ok_or_else(|| {
        DeskError::Configuration(format!("missing API key for {} provider", settings.provider))
    })?;
    Ok(Arc::new(OpenAiProvider::new(
        settings.provider.to_string(),
        settings.model.clone(),
        api_key,
        settings.base_url.clone(),
    )))
}
