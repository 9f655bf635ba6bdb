//! Pipeline stages for invoice analysis.
//!
//! Each submodule implements exactly one step; a submission runs them in
//! order and keeps nothing between runs.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ prepare ──▶ encode ──▶ inference ──▶ export
//! (bytes)    (payload)   (base64)   (model text)  (xlsx buffer)
//! ```
//!
//! 1. [`prepare`]   - turn an optional upload into an [`prepare::ImagePayload`];
//!    no upload means nothing to analyze
//! 2. [`encode`]    - base64-wrap the payload for JSON request bodies
//! 3. [`inference`] - the single model call; the only stage with network I/O
//! 4. [`export`]    - write the answer into a one-cell workbook in memory

pub mod encode;
pub mod export;
pub mod inference;
pub mod prepare;
