//! Output types returned by the analysis entry points.

use crate::pipeline::export::ExportDocument;
use serde::{Deserialize, Serialize};

/// The model's answer, verbatim, plus usage reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Generated text exactly as the model returned it.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Wall-clock time of the model call.
    pub duration_ms: u64,
}

/// Timing and usage for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub provider: String,
    pub model: String,
    pub image_bytes: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub inference_ms: u64,
    pub export_ms: u64,
    pub total_ms: u64,
    pub export_bytes: usize,
}

/// Everything a successful submission produces.
///
/// Serialises without the workbook bytes; `document.bytes` is for the
/// download, not for JSON.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub result: AnalysisResult,
    pub document: ExportDocument,
    pub stats: AnalysisStats,
}

impl AnalysisOutput {
    /// The answer text.
    pub fn answer(&self) -> &str {
        &self.result.text
    }
}
