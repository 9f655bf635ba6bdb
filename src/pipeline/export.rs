//! Report export: the answer as a one-sheet Excel workbook, in memory.
//!
//! Layout matches a single-column dataframe written without an index:
//!
//! ```text
//! Invoice Analysis
//!   A1  Response      (bold header)
//!   A2  <answer text>
//! ```
//!
//! The text is written as-is. XML escaping is handled by rust_xlsxwriter;
//! Excel's own limits (32 767 characters per cell) are reported as
//! [`InvoiceError::ExportFailed`] rather than silently truncated.

use crate::error::InvoiceError;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Name of the only worksheet.
pub const SHEET_NAME: &str = "Invoice Analysis";

/// Header of the only column.
pub const RESPONSE_HEADER: &str = "Response";

/// File name offered for download.
pub const EXPORT_FILE_NAME: &str = "invoice_analysis.xlsx";

/// Media type of the workbook.
pub const XLSX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const COLUMN_WIDTH: f64 = 100.0;

/// An in-memory `.xlsx` workbook ready to be offered for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDocument {
    pub file_name: String,
    pub media_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub size: usize,
}

impl ExportDocument {
    /// Write the workbook to `path` atomically (temp file + rename).
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<(), InvoiceError> {
        let path = path.as_ref();
        let write_err = |source| InvoiceError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = path.with_extension("xlsx.tmp");
        tokio::fs::write(&tmp_path, &self.bytes)
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

        debug!("Wrote {} bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }
}

/// Build the workbook for `text`.
///
/// An empty `text` leaves A2 blank; Excel has no stored form for an empty
/// string cell, so readers see an empty value either way.
pub fn export(text: &str) -> Result<ExportDocument, InvoiceError> {
    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center);
    let wrap = Format::new().set_text_wrap().set_align(FormatAlign::Top);

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        sheet.set_column_width(0, COLUMN_WIDTH)?;
        sheet.write_string_with_format(0, 0, RESPONSE_HEADER, &header)?;
        if !text.is_empty() {
            sheet.write_string_with_format(1, 0, text, &wrap)?;
        }
    }

    let bytes = workbook.save_to_buffer()?;
    debug!("Built workbook: {} bytes for {} chars", bytes.len(), text.chars().count());

    Ok(ExportDocument {
        file_name: EXPORT_FILE_NAME.to_string(),
        media_type: XLSX_MEDIA_TYPE.to_string(),
        size: bytes.len(),
        bytes,
    })
}
