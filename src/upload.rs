//! Upload handling: turn a user-supplied path, URL, or byte buffer into an
//! in-memory [`Upload`].
//!
//! This is the only place that looks at file extensions. The accepted set
//! (JPG, JPEG, PNG) mirrors what an upload widget would offer; nothing here
//! decodes or validates the image content itself.

use crate::error::InvoiceError;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extensions accepted for uploads, lower-case.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// An uploaded file: a declared media type plus raw content.
pub trait UploadedFile {
    /// Media type declared for the upload, e.g. `"image/png"`.
    fn media_type(&self) -> &str;

    /// The complete file content.
    fn contents(&self) -> &[u8];
}

/// An image upload held entirely in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    file_name: Option<String>,
    media_type: String,
    bytes: Vec<u8>,
}

impl Upload {
    /// Wrap bytes that are already in memory.
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: None,
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Attach the original file name.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a local image file.
    ///
    /// The media type comes from the extension; anything outside
    /// [`ACCEPTED_EXTENSIONS`] is rejected before the file is read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, InvoiceError> {
        let path = path.as_ref();
        let media_type = media_type_for_path(path)?;

        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => InvoiceError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => InvoiceError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => InvoiceError::Internal(format!("Failed to read {}: {}", path.display(), e)),
        })?;

        debug!("Read upload {} ({} bytes, {})", path.display(), bytes.len(), media_type);

        let mut upload = Upload::new(media_type, bytes);
        if let Some(name) = path.file_name() {
            upload.file_name = Some(name.to_string_lossy().into_owned());
        }
        Ok(upload)
    }

    /// Download an image over HTTP(S).
    ///
    /// The media type is taken from `Content-Type` when the server sends an
    /// accepted image type, otherwise from the URL's extension.
    ///
    /// A zero `timeout_secs` is rejected as [`InvoiceError::InvalidConfig`]
    /// before any connection is made.
    pub async fn from_url(url: &str, timeout_secs: u64) -> Result<Self, InvoiceError> {
        if timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig("Download timeout must be ≥ 1s".into()));
        }
        info!("Downloading invoice image from: {}", url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InvoiceError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                InvoiceError::DownloadTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                InvoiceError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(InvoiceError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase());

        let file_name = file_name_from_url(url);
        let media_type = match header_type {
            Some(t) if is_accepted_media_type(&t) => normalise_media_type(&t),
            other => media_type_for_path(Path::new(file_name.as_deref().unwrap_or("")))
                .map(str::to_string)
                .map_err(|_| InvoiceError::UnsupportedImageType {
                    input: url.to_string(),
                    found: other.unwrap_or_else(|| "unknown".to_string()),
                })?,
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| InvoiceError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        info!("Downloaded {} bytes ({})", bytes.len(), media_type);

        Ok(Self {
            file_name,
            media_type,
            bytes: bytes.to_vec(),
        })
    }

    /// Pixel dimensions for a preview line, read from the image header.
    ///
    /// Returns `None` when the bytes are not a decodable JPEG/PNG; a broken
    /// preview never blocks a submission.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        image::ImageReader::new(Cursor::new(&self.bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }
}

impl UploadedFile for Upload {
    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn contents(&self) -> &[u8] {
        &self.bytes
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL to an [`Upload`].
pub async fn resolve_upload(input: &str, timeout_secs: u64) -> Result<Upload, InvoiceError> {
    if is_url(input) {
        Upload::from_url(input, timeout_secs).await
    } else {
        Upload::from_path(PathBuf::from(input)).await
    }
}

/// Map an accepted extension to its media type.
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

fn media_type_for_path(path: &Path) -> Result<&'static str, InvoiceError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    media_type_for_extension(&ext).ok_or_else(|| InvoiceError::UnsupportedImageType {
        input: path.display().to_string(),
        found: if ext.is_empty() { "none".into() } else { ext },
    })
}

fn is_accepted_media_type(t: &str) -> bool {
    matches!(t, "image/jpeg" | "image/jpg" | "image/png")
}

/// `image/jpg` is common in the wild but not a registered type.
fn normalise_media_type(t: &str) -> String {
    if t == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        t.to_string()
    }
}

/// Last path segment of a URL, if it looks like a file name.
fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if !last.is_empty() && last.contains('.') {
        Some(last.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/invoice.png"));
        assert!(is_url("http://example.com/invoice.jpg"));
        assert!(!is_url("/tmp/invoice.png"));
        assert!(!is_url("invoice.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(media_type_for_extension("PNG"), Some("image/png"));
        assert_eq!(media_type_for_extension("jpg"), Some("image/jpeg"));
        assert_eq!(media_type_for_extension("jpeg"), Some("image/jpeg"));
        assert_eq!(media_type_for_extension("gif"), None);
        assert_eq!(media_type_for_extension(""), None);
    }

    #[test]
    fn file_name_from_url_extracts_last_segment() {
        assert_eq!(
            file_name_from_url("https://example.com/a/b/invoice-42.png?x=1").as_deref(),
            Some("invoice-42.png")
        );
        assert_eq!(file_name_from_url("https://example.com/scan"), None);
    }

    #[test]
    fn dimensions_of_png() {
        let upload = Upload::new("image/png", png_bytes(12, 7));
        assert_eq!(upload.dimensions(), Some((12, 7)));
    }

    #[test]
    fn dimensions_of_garbage_is_none() {
        let upload = Upload::new("image/png", b"not an image".to_vec());
        assert_eq!(upload.dimensions(), None);
    }

    #[tokio::test]
    async fn from_path_reads_bytes_and_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.PNG");
        let bytes = png_bytes(4, 4);
        std::fs::write(&path, &bytes).unwrap();

        let upload = Upload::from_path(&path).await.unwrap();
        assert_eq!(upload.media_type(), "image/png");
        assert_eq!(upload.contents(), bytes.as_slice());
        assert_eq!(upload.file_name(), Some("invoice.PNG"));
    }

    #[tokio::test]
    async fn zero_download_timeout_is_a_config_error() {
        let err = resolve_upload("http://127.0.0.1:9/invoice.png", 0).await.unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidConfig(_)), "{err:?}");
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let err = Upload::from_path("/definitely/not/here.jpg").await.unwrap_err();
        assert!(matches!(err, InvoiceError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn from_path_rejects_unaccepted_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let err = Upload::from_path(&path).await.unwrap_err();
        match err {
            InvoiceError::UnsupportedImageType { found, .. } => assert_eq!(found, "gif"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
