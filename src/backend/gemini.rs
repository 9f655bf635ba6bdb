//! Native Gemini backend (`models/{model}:generateContent`).
//!
//! One request, one user turn with three parts in this order:
//!
//! ```text
//! { "contents": [{ "role": "user", "parts": [
//!     { "text": <instruction> },
//!     { "inlineData": { "mimeType": <media type>, "data": <base64> } },
//!     { "text": <question> } ] }],
//!   "generationConfig": { "temperature": …, "maxOutputTokens": … } }
//! ```
//!
//! The answer is the concatenated text of the first candidate. A blocked
//! prompt, or a safety stop with no text, is reported as
//! [`InvoiceError::ResponseBlocked`] rather than as an empty answer.

use super::{GenerationOptions, ModelReply, VisionModel};
use crate::config::DEFAULT_GEMINI_BASE_URL;
use crate::error::InvoiceError;
use crate::pipeline::encode::encode_payload;
use crate::pipeline::inference::AnalysisRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

const PROVIDER: &str = "gemini";

/// Finish reasons that mean the model refused rather than finished.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "IMAGE_SAFETY",
];

/// Gemini REST client holding an explicit API key.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiBackend {
    /// Create a backend for `model` authenticated with `api_key`.
    ///
    /// An empty key is rejected here so the failure shows up before any
    /// network traffic.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, InvoiceError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(InvoiceError::ProviderNotConfigured {
                provider: PROVIDER.to_string(),
                hint: "The Gemini API key is empty. Set GOOGLE_API_KEY or pass --api-key.".into(),
            });
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| InvoiceError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        })
    }

    /// Point the backend at another endpoint (proxy, regional gateway).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Use a preconfigured HTTP client (proxy, custom TLS roots).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl VisionModel for GeminiBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &AnalysisRequest<'_>,
        options: &GenerationOptions,
    ) -> Result<ModelReply, InvoiceError> {
        let start = Instant::now();
        let body = build_request(request, options, encode_payload(request.image));

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvoiceError::ApiTimeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    }
                } else {
                    InvoiceError::RequestFailed {
                        provider: PROVIDER.to_string(),
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            warn!("Gemini returned HTTP {}", status.as_u16());
            return Err(map_status(status.as_u16(), retry_after, &text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| InvoiceError::RequestFailed {
                provider: PROVIDER.to_string(),
                detail: e.to_string(),
            })?;
        debug!("Gemini response: {} bytes", text.len());

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| InvoiceError::MalformedResponse {
                provider: PROVIDER.to_string(),
                detail: e.to_string(),
            })?;

        extract_reply(parsed)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn build_request<'a>(
    request: &AnalysisRequest<'a>,
    options: &GenerationOptions,
    image_b64: String,
) -> GenerateContentRequest<'a> {
    let parts = vec![
        Part::Text {
            text: request.instruction,
        },
        Part::InlineData {
            inline_data: Blob {
                mime_type: request.image.media_type(),
                data: image_b64,
            },
        },
        Part::Text {
            text: request.question,
        },
    ];

    let generation_config = (options.temperature.is_some() || options.max_tokens.is_some())
        .then_some(GenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_tokens,
        });

    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config,
    }
}

fn extract_reply(response: GenerateContentResponse) -> Result<ModelReply, InvoiceError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(InvoiceError::ResponseBlocked {
            reason: format!("prompt blocked ({reason})"),
        });
    }

    let (input_tokens, output_tokens) = response
        .usage_metadata
        .as_ref()
        .map(|u| (u.prompt_token_count, u.candidates_token_count))
        .unwrap_or((0, 0));

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(InvoiceError::EmptyResponse);
    };

    let text: String = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        if let Some(reason) = candidate
            .finish_reason
            .as_deref()
            .filter(|r| BLOCKING_FINISH_REASONS.contains(r))
        {
            return Err(InvoiceError::ResponseBlocked {
                reason: format!("finish reason {reason}"),
            });
        }
    }

    Ok(ModelReply {
        text,
        input_tokens,
        output_tokens,
    })
}

fn map_status(status: u16, retry_after_secs: Option<u64>, body: &str) -> InvoiceError {
    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.message, env.error.status),
        Err(_) => (body.chars().take(300).collect(), String::new()),
    };

    match status {
        401 | 403 => InvoiceError::AuthError {
            provider: PROVIDER.to_string(),
            detail: message,
        },
        400 if message.contains("API key") => InvoiceError::AuthError {
            provider: PROVIDER.to_string(),
            detail: message,
        },
        429 => InvoiceError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
            retry_after_secs,
        },
        _ if api_status.is_empty() => InvoiceError::LlmApiError {
            message: format!("HTTP {status}: {message}"),
        },
        _ => InvoiceError::LlmApiError {
            message: format!("HTTP {status} {api_status}: {message}"),
        },
    }
}
