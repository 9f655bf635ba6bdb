//! Inference: one model call per submission.
//!
//! [`InferenceClient`] owns nothing but a [`VisionModel`] handle and the
//! generation options, so it can be built once and shared between
//! submissions. Tests swap the model for a fake; production uses
//! [`crate::backend::GeminiBackend`] or [`crate::backend::ProviderBackend`].
//!
//! There is no retry: a failed call is reported to the caller as a typed
//! [`InvoiceError`] and the submission ends.

use super::prepare::ImagePayload;
use crate::backend::{GenerationOptions, VisionModel};
use crate::config::AnalysisConfig;
use crate::error::InvoiceError;
use crate::output::AnalysisResult;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The three ordered parts of one request: instruction, image, question.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub instruction: &'a str,
    pub image: &'a ImagePayload,
    pub question: &'a str,
}

/// Sends an [`AnalysisRequest`] to a model and returns its answer.
#[derive(Clone)]
pub struct InferenceClient {
    model: Arc<dyn VisionModel>,
    options: GenerationOptions,
    timeout: Option<Duration>,
}

impl InferenceClient {
    /// A client with provider-default options and no timeout.
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            options: GenerationOptions::default(),
            timeout: None,
        }
    }

    /// A client whose options and timeout come from `config`.
    pub fn from_config(model: Arc<dyn VisionModel>, config: &AnalysisConfig) -> Self {
        let timeout = (config.api_timeout_secs > 0)
            .then(|| Duration::from_secs(config.api_timeout_secs));
        Self {
            model,
            options: GenerationOptions {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            timeout,
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Name of the backend this client talks to.
    pub fn provider(&self) -> &str {
        self.model.name()
    }

    /// Model identifier this client talks to.
    pub fn model(&self) -> &str {
        self.model.model()
    }

    /// Ask the model `question` about `image`.
    ///
    /// The question may be empty. The answer text is returned verbatim; a
    /// whitespace-only answer is [`InvoiceError::EmptyResponse`].
    pub async fn analyze(
        &self,
        instruction: &str,
        image: &ImagePayload,
        question: &str,
    ) -> Result<AnalysisResult, InvoiceError> {
        let request = AnalysisRequest {
            instruction,
            image,
            question,
        };
        let start = Instant::now();
        info!(
            "Sending invoice to {} ({}), {} image bytes",
            self.model.name(),
            self.model.model(),
            image.len()
        );

        let call = self.model.generate(&request, &self.options);
        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                warn!("Model call timed out after {:?}", limit);
                InvoiceError::ApiTimeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }
            })??,
            None => call.await?,
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            "{} input tokens, {} output tokens, {}ms",
            reply.input_tokens, reply.output_tokens, elapsed_ms
        );

        if reply.text.trim().is_empty() {
            warn!("Model returned an empty answer");
            return Err(InvoiceError::EmptyResponse);
        }

        Ok(AnalysisResult {
            text: reply.text,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            duration_ms: elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ModelReply;
    use crate::pipeline::prepare::prepare;
    use crate::upload::Upload;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and replies with a canned result.
    struct Recorder {
        reply: Mutex<Option<Result<ModelReply, InvoiceError>>>,
        seen: Mutex<Vec<(String, String, Vec<u8>, String)>>,
        delay: Option<Duration>,
    }

    impl Recorder {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(Ok(ModelReply {
                    text: text.to_string(),
                    input_tokens: 258,
                    output_tokens: 12,
                }))),
                seen: Mutex::new(Vec::new()),
                delay: None,
            })
        }
    }

    #[async_trait]
    impl VisionModel for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn model(&self) -> &str {
            "fake-1"
        }

        async fn generate(
            &self,
            request: &AnalysisRequest<'_>,
            _options: &GenerationOptions,
        ) -> Result<ModelReply, InvoiceError> {
            self.seen.lock().unwrap().push((
                request.instruction.to_string(),
                request.image.media_type().to_string(),
                request.image.bytes().to_vec(),
                request.question.to_string(),
            ));
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(InvoiceError::Internal("called twice".into())))
        }
    }

    fn payload() -> ImagePayload {
        prepare(Some(&Upload::new("image/png", vec![1, 2, 3, 4]))).unwrap()
    }

    #[tokio::test]
    async fn passes_parts_in_order_and_returns_text() {
        let model = Recorder::answering("The total is $1,250.00");
        let client = InferenceClient::new(model.clone());

        let result = client
            .analyze("instruction", &payload(), "What is the total amount?")
            .await
            .unwrap();

        assert_eq!(result.text, "The total is $1,250.00");
        assert_eq!(result.input_tokens, 258);
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "instruction");
        assert_eq!(seen[0].1, "image/png");
        assert_eq!(seen[0].2, vec![1, 2, 3, 4]);
        assert_eq!(seen[0].3, "What is the total amount?");
    }

    #[tokio::test]
    async fn empty_question_is_sent_as_is() {
        let model = Recorder::answering("An invoice from ACME.");
        let client = InferenceClient::new(model.clone());
        client.analyze("instruction", &payload(), "").await.unwrap();
        assert_eq!(model.seen.lock().unwrap()[0].3, "");
    }

    #[tokio::test]
    async fn whitespace_answer_is_empty_response() {
        let client = InferenceClient::new(Recorder::answering("  \n "));
        let err = client.analyze("i", &payload(), "q").await.unwrap_err();
        assert!(matches!(err, InvoiceError::EmptyResponse));
    }

    #[tokio::test]
    async fn answer_is_not_trimmed() {
        let client = InferenceClient::new(Recorder::answering("\n  42.00 EUR  \n"));
        let result = client.analyze("i", &payload(), "q").await.unwrap();
        assert_eq!(result.text, "\n  42.00 EUR  \n");
    }

    #[tokio::test]
    async fn backend_error_propagates() {
        let model = Arc::new(Recorder {
            reply: Mutex::new(Some(Err(InvoiceError::AuthError {
                provider: "recorder".into(),
                detail: "API key not valid".into(),
            }))),
            seen: Mutex::new(Vec::new()),
            delay: None,
        });
        let client = InferenceClient::new(model);
        let err = client.analyze("i", &payload(), "q").await.unwrap_err();
        assert!(matches!(err, InvoiceError::AuthError { .. }));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let model = Arc::new(Recorder {
            reply: Mutex::new(Some(Ok(ModelReply {
                text: "late".into(),
                input_tokens: 0,
                output_tokens: 0,
            }))),
            seen: Mutex::new(Vec::new()),
            delay: Some(Duration::from_secs(5)),
        });
        let client = InferenceClient::new(model).with_timeout(Duration::from_millis(20));
        let err = client.analyze("i", &payload(), "q").await.unwrap_err();
        assert!(matches!(err, InvoiceError::ApiTimeout { .. }));
    }

    #[test]
    fn from_config_maps_options() {
        let config = AnalysisConfig::builder()
            .temperature(0.2)
            .max_tokens(512)
            .api_timeout_secs(0)
            .build()
            .unwrap();
        let client = InferenceClient::from_config(Recorder::answering("x"), &config);
        assert_eq!(client.options.temperature, Some(0.2));
        assert_eq!(client.options.max_tokens, Some(512));
        assert!(client.timeout.is_none());
        assert_eq!(client.provider(), "recorder");
        assert_eq!(client.model(), "fake-1");
    }
}
