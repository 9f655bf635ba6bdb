//! Error types for the invoice-analyzer library.
//!
//! Every failure a submission can hit is a variant of [`InvoiceError`], and
//! every variant belongs to exactly one [`ErrorKind`]:
//!
//! * [`ErrorKind::MissingInput`] - nothing was uploaded. Expected and
//!   recoverable; detected before any pipeline stage runs.
//! * [`ErrorKind::RemoteInference`] - the model call failed (network, auth,
//!   rate limit, refusal, garbage response).
//! * [`ErrorKind::Export`] - the workbook could not be built or written.
//!
//! Callers match on the kind to pick a user-facing message, or on the
//! variant when they need the detail (e.g. `retry_after_secs`).

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`InvoiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No image was supplied.
    MissingInput,
    /// The upload could not be read or downloaded.
    Upload,
    /// The library is not set up to talk to a model.
    Configuration,
    /// The outbound model call failed.
    RemoteInference,
    /// Building or writing the spreadsheet failed.
    Export,
    /// Anything else.
    Internal,
}

/// All errors returned by the invoice-analyzer library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Submission without an uploaded image.
    #[error("Please upload an invoice image before submitting.")]
    MissingInput,

    /// Image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The upload is not one of the accepted image types.
    #[error("Unsupported image type '{found}' for '{input}'\nAccepted: JPG, JPEG, PNG.")]
    UnsupportedImageType { input: String, found: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Inference errors ──────────────────────────────────────────────────
    /// The API rejected the credential (401/403 or an invalid-key response).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// HTTP 429 - caller should back off.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The model call did not finish within `api_timeout_secs`.
    #[error("API call timed out after {elapsed_ms}ms")]
    ApiTimeout { elapsed_ms: u64 },

    /// The request never got a response (DNS, TLS, connection reset, …).
    #[error("Request to provider '{provider}' failed: {detail}")]
    RequestFailed { provider: String, detail: String },

    /// The API returned a non-retryable error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The response body could not be decoded.
    #[error("Malformed response from provider '{provider}': {detail}")]
    MalformedResponse { provider: String, detail: String },

    /// The model declined to answer.
    #[error("The model declined to answer: {reason}")]
    ResponseBlocked { reason: String },

    /// The model returned no text.
    #[error("The model returned an empty answer.")]
    EmptyResponse,

    // ── Export errors ─────────────────────────────────────────────────────
    /// rust_xlsxwriter refused the content or failed to serialise it.
    #[error("Failed to build the Excel export: {0}")]
    ExportFailed(String),

    /// Could not create or write the output workbook.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// Which stage of the pipeline this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvoiceError::MissingInput => ErrorKind::MissingInput,
            InvoiceError::FileNotFound { .. }
            | InvoiceError::PermissionDenied { .. }
            | InvoiceError::UnsupportedImageType { .. }
            | InvoiceError::DownloadFailed { .. }
            | InvoiceError::DownloadTimeout { .. } => ErrorKind::Upload,
            InvoiceError::ProviderNotConfigured { .. } | InvoiceError::InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            InvoiceError::AuthError { .. }
            | InvoiceError::RateLimitExceeded { .. }
            | InvoiceError::ApiTimeout { .. }
            | InvoiceError::RequestFailed { .. }
            | InvoiceError::LlmApiError { .. }
            | InvoiceError::MalformedResponse { .. }
            | InvoiceError::ResponseBlocked { .. }
            | InvoiceError::EmptyResponse => ErrorKind::RemoteInference,
            InvoiceError::ExportFailed(_) | InvoiceError::OutputWriteFailed { .. } => {
                ErrorKind::Export
            }
            InvoiceError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for InvoiceError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        InvoiceError::ExportFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_message() {
        let e = InvoiceError::MissingInput;
        assert!(e.to_string().contains("upload an invoice image"));
        assert_eq!(e.kind(), ErrorKind::MissingInput);
    }

    #[test]
    fn rate_limit_display_with_retry() {
        let e = InvoiceError::RateLimitExceeded {
            provider: "gemini".into(),
            retry_after_secs: Some(60),
        };
        assert!(e.to_string().contains("gemini"));
        assert_eq!(e.kind(), ErrorKind::RemoteInference);
    }

    #[test]
    fn api_timeout_display() {
        let e = InvoiceError::ApiTimeout { elapsed_ms: 5000 };
        assert!(e.to_string().contains("5000ms"));
    }

    #[test]
    fn auth_error_display() {
        let e = InvoiceError::AuthError {
            provider: "gemini".into(),
            detail: "invalid key".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("invalid key"));
    }

    #[test]
    fn remote_and_export_kinds_are_distinct() {
        let remote = InvoiceError::EmptyResponse;
        let export = InvoiceError::ExportFailed("boom".into());
        assert_eq!(remote.kind(), ErrorKind::RemoteInference);
        assert_eq!(export.kind(), ErrorKind::Export);
        assert_ne!(remote.to_string(), export.to_string());
    }

    #[test]
    fn upload_errors_classified() {
        let e = InvoiceError::UnsupportedImageType {
            input: "scan.gif".into(),
            found: "gif".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Upload);
        assert!(e.to_string().contains("PNG"));
    }
}
