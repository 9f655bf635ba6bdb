//! Model backends behind the [`VisionModel`] seam.
//!
//! The pipeline only ever sees `Arc<dyn VisionModel>`. Two implementations
//! ship with the crate:
//!
//! * [`GeminiBackend`] - calls the Gemini `generateContent` REST endpoint
//!   directly. The API key is a constructor argument.
//! * [`ProviderBackend`] - adapts any `edgequake_llm::LLMProvider`
//!   (OpenAI, Anthropic, Mistral, Ollama, …). Credentials are whatever the
//!   provider was built with.
//!
//! Anything else (a fake for tests, a caching proxy) just implements the
//! trait and goes in [`crate::config::AnalysisConfig::backend`].

mod gemini;
mod provider;

pub use gemini::GeminiBackend;
pub use provider::{default_model_for_provider, ProviderBackend};

use crate::error::InvoiceError;
use crate::pipeline::inference::AnalysisRequest;
use async_trait::async_trait;

/// Sampling knobs forwarded to the model. `None` keeps the provider default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// Raw answer from a backend, before any emptiness check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A remote multimodal model that answers a question about one image.
///
/// `generate` must make at most one outbound call and must not retry.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Provider name for logs and stats, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Model identifier, e.g. `"gemini-1.5-flash"`.
    fn model(&self) -> &str;

    /// Send instruction, image and question; return the generated text.
    async fn generate(
        &self,
        request: &AnalysisRequest<'_>,
        options: &GenerationOptions,
    ) -> Result<ModelReply, InvoiceError>;
}
