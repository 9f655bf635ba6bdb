//! [`VisionModel`] adapter for edgequake-llm providers.

use super::{GenerationOptions, ModelReply, VisionModel};
use crate::error::InvoiceError;
use crate::pipeline::encode::to_image_data;
use crate::pipeline::inference::AnalysisRequest;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Default vision-capable model for a provider name.
pub fn default_model_for_provider(provider: &str) -> &'static str {
    match provider.to_ascii_lowercase().as_str() {
        "gemini" | "google" => crate::config::DEFAULT_GEMINI_MODEL,
        "anthropic" | "claude" => "claude-sonnet-4-20250514",
        "mistral" => "pixtral-12b-2409",
        "ollama" | "lmstudio" => "llava",
        _ => "gpt-4.1-nano",
    }
}

/// Any `edgequake_llm::LLMProvider` as a [`VisionModel`].
///
/// The instruction goes in a system message; the question and the image go
/// in a single user message.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    name: String,
    model: String,
}

impl ProviderBackend {
    /// Wrap an already-configured provider.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            model: model.into(),
        }
    }

    /// Build a provider through [`ProviderFactory`], which reads the
    /// provider's own API key variable (`OPENAI_API_KEY`, …).
    pub fn from_factory(name: &str, model: &str) -> Result<Self, InvoiceError> {
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            InvoiceError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, name, model))
    }
}

#[async_trait]
impl VisionModel for ProviderBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &AnalysisRequest<'_>,
        options: &GenerationOptions,
    ) -> Result<ModelReply, InvoiceError> {
        let messages = vec![
            ChatMessage::system(request.instruction),
            ChatMessage::user_with_images(request.question, vec![to_image_data(request.image)]),
        ];
        let completion = build_options(options);

        let response = self
            .provider
            .chat(&messages, Some(&completion))
            .await
            .map_err(|e| InvoiceError::LlmApiError {
                message: format!("{}: {}", self.name, e),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

fn build_options(options: &GenerationOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        ..Default::default()
    }
}
