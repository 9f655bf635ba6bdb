//! # invoice-analyzer
//!
//! Ask a multimodal LLM a question about an invoice image and get the answer
//! back as text and as a one-cell Excel workbook.
//!
//! ## Pipeline Overview
//!
//! ```text
//! invoice image (path / URL / bytes) + question
//!  │
//!  ├─ 1. Prepare   pair the raw bytes with the declared media type
//!  ├─ 2. Infer     one call: instruction, image, question → answer text
//!  └─ 3. Export    "Invoice Analysis" sheet, "Response" column, one row
//! ```
//!
//! Nothing is kept between submissions. A missing image stops the pipeline
//! before any request is made; every other failure is a typed
//! [`InvoiceError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_analyzer::{analyze_invoice, AnalysisConfig, Upload};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::builder()
//!         .api_key(std::env::var("GOOGLE_API_KEY")?)
//!         .build()?;
//!     let upload = Upload::from_path("invoice.png").await?;
//!     let output = analyze_invoice(Some(&upload), "What is the total amount?", &config).await?;
//!     println!("{}", output.answer());
//!     output.document.write_to("invoice_analysis.xlsx").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice-analyzer` binary (clap + anyhow + tracing-subscriber + indicatif + dotenv) |
//!
//! ## Backends
//!
//! Gemini is the default and is called directly with the API key from
//! [`AnalysisConfig::api_key`]. Any other provider name (`openai`,
//! `anthropic`, `mistral`, `ollama`, …) goes through `edgequake-llm`. Custom
//! backends implement [`VisionModel`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod backend;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_invoice, analyze_sync, analyze_to_file, resolve_backend};
pub use backend::{GeminiBackend, GenerationOptions, ModelReply, ProviderBackend, VisionModel};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{ErrorKind, InvoiceError};
pub use output::{AnalysisOutput, AnalysisResult, AnalysisStats};
pub use pipeline::export::{export, ExportDocument, EXPORT_FILE_NAME, XLSX_MEDIA_TYPE};
pub use pipeline::inference::{AnalysisRequest, InferenceClient};
pub use pipeline::prepare::{prepare, ImagePayload};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use upload::{resolve_upload, Upload, UploadedFile};
