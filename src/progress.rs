//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to be told when
//! each stage of a submission starts and finishes. The model call is the slow
//! part (seconds), so a UI typically shows a spinner between
//! `on_inference_start` and `on_inference_complete`.
//!
//! # Example
//!
//! ```rust
//! use invoice_analyzer::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl AnalysisProgressCallback for Log {
//!     fn on_inference_complete(&self, answer_len: usize, elapsed_ms: u64) {
//!         eprintln!("answer: {answer_len} bytes in {elapsed_ms}ms");
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Log) as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as a submission moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`; the config
/// that carries them may be shared between tasks.
pub trait AnalysisProgressCallback: Send + Sync {
    /// The image has been packaged.
    ///
    /// # Arguments
    /// * `media_type` - declared media type of the upload
    /// * `bytes`      - size of the image payload
    fn on_image_prepared(&self, media_type: &str, bytes: usize) {
        let _ = (media_type, bytes);
    }

    /// The request is about to be sent.
    ///
    /// # Arguments
    /// * `provider` - backend name, e.g. `"gemini"`
    /// * `model`    - model identifier
    fn on_inference_start(&self, provider: &str, model: &str) {
        let _ = (provider, model);
    }

    /// The model answered.
    ///
    /// # Arguments
    /// * `answer_len` - byte length of the answer
    /// * `elapsed_ms` - wall-clock time of the call
    fn on_inference_complete(&self, answer_len: usize, elapsed_ms: u64) {
        let _ = (answer_len, elapsed_ms);
    }

    /// The workbook has been built in memory.
    fn on_export_complete(&self, workbook_bytes: usize) {
        let _ = workbook_bytes;
    }

    /// A stage failed; the submission is over.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
