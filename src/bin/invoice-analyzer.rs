//! CLI binary for invoice-analyzer.
//!
//! A thin shim over the library crate: maps CLI flags to `AnalysisConfig`,
//! shows a spinner while the model thinks, prints the answer, and writes the
//! Excel export.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_analyzer::{
    analyze_invoice, resolve_upload, AnalysisConfig, AnalysisProgressCallback, ErrorKind,
    InvoiceError, ProgressCallback, Upload, UploadedFile, EXPORT_FILE_NAME,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while the model call is in flight.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_image_prepared(&self, media_type: &str, bytes: usize) {
        self.bar
            .set_message(format!("{media_type}, {:.1} KB", bytes as f64 / 1024.0));
    }

    fn on_inference_start(&self, provider: &str, model: &str) {
        self.bar.set_prefix("Analyzing");
        self.bar.set_message(format!("{provider} / {model}"));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_inference_complete(&self, answer_len: usize, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} Answer received  {}",
            green("✓"),
            dim(&format!("{answer_len} chars, {:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.set_prefix("Exporting");
        self.bar.set_message(EXPORT_FILE_NAME);
    }

    fn on_export_complete(&self, _workbook_bytes: usize) {
        self.bar.finish_and_clear();
    }

    fn on_error(&self, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask about a local invoice
  invoice-analyzer invoice.png -q "What is the total amount?"

  # Choose where the Excel file goes
  invoice-analyzer scan.jpg -q "Who is the vendor?" -o reports/vendor.xlsx

  # Invoice from a URL, answer only
  invoice-analyzer https://example.com/invoice.png -q "Due date?" --no-export

  # JSON output (answer + stats)
  invoice-analyzer invoice.png -q "List the line items" --json

  # Another provider through edgequake-llm
  invoice-analyzer invoice.png -q "Total?" --provider openai --model gpt-4.1-mini

ENVIRONMENT VARIABLES (also read from .env):
  GOOGLE_API_KEY          Gemini API key (default backend)
  INVOICE_MODEL           Override model ID (default: gemini-1.5-flash)
  INVOICE_PROVIDER        gemini (default), openai, anthropic, mistral, ollama
  OPENAI_API_KEY, ...     Keys for non-Gemini providers
  RUST_LOG                Log filter, e.g. invoice_analyzer=debug
"#;

/// Ask questions about invoice images with a multimodal LLM.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-analyzer",
    version,
    about = "Ask questions about invoice images and export the answer to Excel",
    long_about = "Send an invoice image (JPG or PNG, local file or URL) and a question to a \
multimodal LLM. The answer is printed and saved as a one-sheet Excel workbook.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Invoice image: local JPG/PNG path or HTTP/HTTPS URL.
    input: Option<String>,

    /// Question to ask about the invoice.
    #[arg(short, long, env = "INVOICE_QUESTION", default_value = "")]
    question: String,

    /// Where to write the Excel export.
    #[arg(short, long, env = "INVOICE_OUTPUT", default_value = EXPORT_FILE_NAME)]
    output: PathBuf,

    /// Print the answer only; do not write the Excel file.
    #[arg(long)]
    no_export: bool,

    /// Gemini API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID (e.g. gemini-1.5-flash, gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "INVOICE_MODEL")]
    model: Option<String>,

    /// Provider: gemini, openai, anthropic, mistral, ollama.
    #[arg(long, env = "INVOICE_PROVIDER")]
    provider: Option<String>,

    /// Gemini API base URL.
    #[arg(long, env = "GEMINI_BASE_URL")]
    base_url: Option<String>,

    /// Path to a text file with a custom instruction prompt.
    #[arg(long, env = "INVOICE_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Sampling temperature (0.0–2.0). Provider default if unset.
    #[arg(long, env = "INVOICE_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens. Provider default if unset.
    #[arg(long, env = "INVOICE_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Model call timeout in seconds (0 = none).
    #[arg(long, env = "INVOICE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "INVOICE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON (answer, export metadata, stats).
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the answer and errors.
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    // .env first so clap's `env` fallbacks see it.
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{} failed to start runtime: {e}", red("✘"));
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

/// Print a message that matches the failure kind and pick an exit code.
fn report(err: &anyhow::Error) -> ExitCode {
    let Some(e) = err.downcast_ref::<InvoiceError>() else {
        eprintln!("{} {err:#}", red("✘"));
        return ExitCode::FAILURE;
    };

    let label = match e.kind() {
        ErrorKind::MissingInput => {
            eprintln!("{} {}", yellow("⚠️"), e);
            return ExitCode::from(2);
        }
        ErrorKind::Upload => "Could not read the invoice image",
        ErrorKind::Configuration => "Not configured",
        ErrorKind::RemoteInference => "The model request failed",
        ErrorKind::Export => "Could not produce the Excel file",
        ErrorKind::Internal => "Internal error",
    };
    eprintln!("{} {}\n  {}", red("✘"), bold(label), e);
    if let InvoiceError::RateLimitExceeded {
        retry_after_secs: Some(secs),
        ..
    } = e
    {
        eprintln!("  {}", dim(&format!("Retry after {secs}s.")));
    }
    ExitCode::FAILURE
}

async fn run(cli: Cli) -> Result<()> {
    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers INFO-level feedback; keep library logs quiet
    // unless asked.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    // Validate before downloading.
    let config = build_config(&cli, progress_cb).await?;

    // ── Upload ───────────────────────────────────────────────────────────
    let upload: Option<Upload> = match cli.input.as_deref() {
        Some(input) => Some(resolve_upload(input, config.download_timeout_secs).await?),
        None => None,
    };

    if let (Some(u), false) = (upload.as_ref(), cli.quiet) {
        let size = format!("{:.1} KB", u.len() as f64 / 1024.0);
        let dims = u
            .dimensions()
            .map(|(w, h)| format!("{w}×{h}, "))
            .unwrap_or_default();
        eprintln!(
            "{} {}  {}",
            dim("Uploaded image:"),
            bold(u.file_name().unwrap_or("(unnamed)")),
            dim(&format!("{dims}{size}, {}", u.media_type())),
        );
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let output = analyze_invoice(upload.as_ref(), &cli.question, &config).await?;

    if !cli.no_export {
        output
            .document
            .write_to(&cli.output)
            .await
            .context("Failed to save the Excel export")?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.answer().as_bytes())
            .context("Failed to write to stdout")?;
        if !output.answer().ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        if !cli.no_export {
            eprintln!(
                "{}  {}  {}",
                green("✔"),
                bold(&cli.output.display().to_string()),
                dim(&format!("{} bytes", output.stats.export_bytes)),
            );
        }
        eprintln!(
            "   {} tokens in  /  {} tokens out  ·  {}ms total",
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
            output.stats.total_ms,
        );
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction prompt from {:?}", path))?;
        builder = builder.instruction_prompt(prompt.trim_end());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.as_str());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.gemini_base_url(url.as_str());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let config = builder.build()?;
    tracing::debug!("Config: {:?}", config);
    Ok(config)
}
