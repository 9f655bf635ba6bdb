//! Configuration for invoice analysis.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. The API credential lives here as a plain value
//! handed in by the caller; the library never reads it from the environment.

use crate::backend::VisionModel;
use crate::error::InvoiceError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Gemini model used when neither `model` nor a backend is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Public Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for one or many invoice submissions.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use invoice_analyzer::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .api_key("test-key")
///     .model("gemini-1.5-flash")
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// API key for the Gemini backend. Required unless `backend` or a
    /// non-Gemini `provider_name` is set.
    pub api_key: Option<String>,

    /// Model identifier, e.g. "gemini-1.5-flash", "gpt-4.1-nano".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Provider name ("gemini", "openai", "anthropic", "ollama", …).
    /// None means Gemini.
    pub provider_name: Option<String>,

    /// Pre-constructed model backend. Takes precedence over everything else.
    pub backend: Option<Arc<dyn VisionModel>>,

    /// Base URL of the Gemini REST API. Default: [`DEFAULT_GEMINI_BASE_URL`].
    pub gemini_base_url: String,

    /// Instruction text sent before the image. If None, uses
    /// [`crate::prompts::DEFAULT_INSTRUCTION_PROMPT`].
    pub instruction_prompt: Option<String>,

    /// Sampling temperature. None leaves the provider default in place.
    pub temperature: Option<f32>,

    /// Maximum tokens the model may generate. None leaves the provider default.
    pub max_tokens: Option<usize>,

    /// Timeout for the model call in seconds; 0 disables it. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL uploads in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional stage-event callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            provider_name: None,
            backend: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            instruction_prompt: None,
            temperature: None,
            max_tokens: None,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("gemini_base_url", &self.gemini_base_url)
            .field("instruction_prompt", &self.instruction_prompt.as_ref().map(|p| p.len()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl fmt::Debug for AnalysisConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn VisionModel>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into();
        self
    }

    pub fn instruction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.instruction_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, InvoiceError> {
        let c = &self.config;
        if c.max_tokens == Some(0) {
            return Err(InvoiceError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !c.gemini_base_url.starts_with("http://") && !c.gemini_base_url.starts_with("https://") {
            return Err(InvoiceError::InvalidConfig(format!(
                "Gemini base URL must be http(s), got '{}'",
                c.gemini_base_url
            )));
        }
        if c.download_timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig("Download timeout must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}
