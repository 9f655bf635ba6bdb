//! Instruction prompt sent ahead of every invoice image.
//!
//! Callers can override it via [`crate::config::AnalysisConfig::instruction_prompt`];
//! the constant here is used only when no override is provided.

/// Default instruction text. It is the first of the three parts of every
/// request (instruction, image, question).
pub const DEFAULT_INSTRUCTION_PROMPT: &str = "You are an expert in understanding invoices. \
You will receive invoice images and answer questions based on the input image.";
