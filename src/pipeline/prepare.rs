//! Image preparation: pair the uploaded bytes with their declared media type.

use crate::upload::UploadedFile;
use tracing::debug;

/// An uploaded image ready to be sent to a model.
///
/// Immutable once built; the bytes are exactly what was uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    media_type: String,
    bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Package an upload for inference.
///
/// `None` in, `None` out: a missing upload is a valid "nothing to analyze
/// yet" state, and the caller decides what to tell the user. No size limit
/// and no format check is applied.
pub fn prepare<F>(upload: Option<&F>) -> Option<ImagePayload>
where
    F: UploadedFile + ?Sized,
{
    let file = upload?;
    let payload = ImagePayload {
        media_type: file.media_type().to_string(),
        bytes: file.contents().to_vec(),
    };
    debug!(
        "Prepared image payload: {} bytes, {}",
        payload.bytes.len(),
        payload.media_type
    );
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::Upload;

    #[test]
    fn no_upload_is_absent() {
        assert!(prepare::<Upload>(None).is_none());
    }

    #[test]
    fn payload_matches_upload_exactly() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let upload = Upload::new("image/jpeg", bytes.clone());

        let payload = prepare(Some(&upload)).expect("payload");
        assert_eq!(payload.bytes(), bytes.as_slice());
        assert_eq!(payload.media_type(), "image/jpeg");
    }

    #[test]
    fn declared_type_is_not_second_guessed() {
        // PNG magic with a JPEG declaration stays a JPEG declaration.
        let upload = Upload::new("image/jpeg", b"\x89PNG\r\n\x1a\n".to_vec());
        let payload = prepare(Some(&upload)).unwrap();
        assert_eq!(payload.media_type(), "image/jpeg");
    }

    #[test]
    fn empty_upload_still_prepared() {
        let upload = Upload::new("image/png", Vec::new());
        let payload = prepare(Some(&upload)).unwrap();
        assert!(payload.is_empty());
    }

    struct BorrowedFile<'a> {
        kind: &'a str,
        data: &'a [u8],
    }

    impl UploadedFile for BorrowedFile<'_> {
        fn media_type(&self) -> &str {
            self.kind
        }

        fn contents(&self) -> &[u8] {
            self.data
        }
    }

    #[test]
    fn works_with_any_uploaded_file() {
        let file = BorrowedFile {
            kind: "image/png",
            data: &[1, 2, 3],
        };
        let payload = prepare(Some(&file)).unwrap();
        assert_eq!(payload.bytes(), &[1, 2, 3]);
    }
}
