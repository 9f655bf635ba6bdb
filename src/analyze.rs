//! Analysis entry points: prepare → inference → export for one submission.
//!
//! Each call is an isolated pipeline run. The only thing shared between
//! calls is the read-only [`AnalysisConfig`].

use crate::backend::{default_model_for_provider, GeminiBackend, ProviderBackend, VisionModel};
use crate::config::{AnalysisConfig, DEFAULT_GEMINI_MODEL};
use crate::error::InvoiceError;
use crate::output::{AnalysisOutput, AnalysisStats};
use crate::pipeline::export::export;
use crate::pipeline::inference::InferenceClient;
use crate::pipeline::prepare::prepare;
use crate::prompts::DEFAULT_INSTRUCTION_PROMPT;
use crate::upload::Upload;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Ask `question` about the uploaded invoice and build the Excel export.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `upload`   - the invoice image, or `None` if nothing was uploaded
/// * `question` - free text; may be empty
/// * `config`   - backend, credentials and options
///
/// # Errors
/// * [`InvoiceError::MissingInput`] when `upload` is `None`; no backend is
///   resolved and no request is sent
/// * configuration errors when no backend can be built
/// * any inference or export error, each as its own variant
pub async fn analyze_invoice(
    upload: Option<&Upload>,
    question: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, InvoiceError> {
    let result = run_pipeline(upload, question, config).await;
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_error(&e.to_string());
    }
    result
}

async fn run_pipeline(
    upload: Option<&Upload>,
    question: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, InvoiceError> {
    let total_start = Instant::now();

    // ── Step 1: Prepare image ────────────────────────────────────────────
    let Some(payload) = prepare(upload) else {
        warn!("Submission without an image; nothing sent");
        return Err(InvoiceError::MissingInput);
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_image_prepared(payload.media_type(), payload.len());
    }

    // ── Step 2: Resolve backend ──────────────────────────────────────────
    let backend = resolve_backend(config)?;
    let client = InferenceClient::from_config(backend, config);
    let instruction = config
        .instruction_prompt
        .as_deref()
        .unwrap_or(DEFAULT_INSTRUCTION_PROMPT);

    // ── Step 3: Ask the model ────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_inference_start(client.provider(), client.model());
    }
    let result = client.analyze(instruction, &payload, question).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_inference_complete(result.text.len(), result.duration_ms);
    }
    drop(payload);

    // ── Step 4: Export ───────────────────────────────────────────────────
    let export_start = Instant::now();
    let document = export(&result.text)?;
    let export_ms = export_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_export_complete(document.bytes.len());
    }

    let stats = AnalysisStats {
        provider: client.provider().to_string(),
        model: client.model().to_string(),
        image_bytes: upload.map(|u| u.len()).unwrap_or(0),
        input_tokens: result.input_tokens,
        output_tokens: result.output_tokens,
        inference_ms: result.duration_ms,
        export_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
        export_bytes: document.bytes.len(),
    };

    info!(
        "Analysis complete: {} chars answer, {} byte workbook, {}ms total",
        result.text.chars().count(),
        stats.export_bytes,
        stats.total_ms
    );

    Ok(AnalysisOutput {
        result,
        document,
        stats,
    })
}

/// Analyze and write the workbook straight to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyze_to_file(
    upload: Option<&Upload>,
    question: &str,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, InvoiceError> {
    let output = analyze_invoice(upload, question, config).await?;
    output.document.write_to(output_path).await?;
    Ok(output)
}

/// Synchronous wrapper around [`analyze_invoice`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn analyze_sync(
    upload: Option<&Upload>,
    question: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, InvoiceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze_invoice(upload, question, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the model backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`) - used as-is. Tests inject
///    fakes here.
/// 2. **Named non-Gemini provider** (`config.provider_name`) - built with
///    [`ProviderBackend::from_factory`]; the provider reads its own key.
/// 3. **Gemini** - built from `config.api_key`. A missing key is a
///    configuration error, never an environment lookup.
pub fn resolve_backend(config: &AnalysisConfig) -> Result<Arc<dyn VisionModel>, InvoiceError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref name) = config.provider_name {
        let lower = name.to_ascii_lowercase();
        if lower != "gemini" && lower != "google" {
            let model = config
                .model
                .as_deref()
                .unwrap_or_else(|| default_model_for_provider(&lower));
            debug!("Using edgequake-llm provider {} ({})", lower, model);
            return Ok(Arc::new(ProviderBackend::from_factory(&lower, model)?));
        }
    }

    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| InvoiceError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: "No Gemini API key configured.\n\
                   Set GOOGLE_API_KEY (or put it in .env), or pass --api-key."
                .to_string(),
        })?;
    let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
    debug!("Using Gemini backend ({})", model);

    let backend = GeminiBackend::new(api_key, model)?.with_base_url(&config.gemini_base_url);
    Ok(Arc::new(backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_without_key_is_not_configured() {
        let config = AnalysisConfig::default();
        match resolve_backend(&config) {
            Err(InvoiceError::ProviderNotConfigured { provider, .. }) => {
                assert_eq!(provider, "gemini")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn gemini_with_key_uses_default_model() {
        let config = AnalysisConfig::builder().api_key("test-key").build().unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.name(), "gemini");
        assert_eq!(backend.model(), DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn explicit_gemini_provider_name_uses_native_backend() {
        let config = AnalysisConfig::builder()
            .provider_name("Gemini")
            .model("gemini-2.0-flash")
            .api_key("test-key")
            .build()
            .unwrap();
        let backend = resolve_backend(&config).unwrap();
        assert_eq!(backend.name(), "gemini");
        assert_eq!(backend.model(), "gemini-2.0-flash");
    }

    #[test]
    fn missing_input_never_resolves_backend() {
        // No key configured: if the backend were resolved first this would be
        // a configuration error instead.
        let config = AnalysisConfig::default();
        let err = analyze_sync(None, "What is the total amount?", &config).unwrap_err();
        assert!(matches!(err, InvoiceError::MissingInput));
    }
}
