//! Image encoding: `ImagePayload` → base64 for multimodal request bodies.
//!
//! Gemini takes the image as `inlineData.data`; the edgequake-llm providers
//! take an `ImageData`. Both want standard-alphabet, padded base64 of the
//! original bytes. The bytes are never re-encoded or resized.

use super::prepare::ImagePayload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Base64 of the payload bytes.
pub fn encode_payload(payload: &ImagePayload) -> String {
    let b64 = STANDARD.encode(payload.bytes());
    debug!("Encoded image → {} bytes base64", b64.len());
    b64
}

/// Wrap the payload for an edgequake-llm chat message.
///
/// `detail: "high"` keeps small print (line items, totals) legible for
/// OpenAI-style tiling.
pub fn to_image_data(payload: &ImagePayload) -> ImageData {
    ImageData::new(encode_payload(payload), payload.media_type()).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::prepare::prepare;
    use crate::upload::Upload;

    #[test]
    fn encode_decodes_to_original_bytes() {
        let upload = Upload::new("image/png", vec![0x89, b'P', b'N', b'G', 0, 255]);
        let payload = prepare(Some(&upload)).unwrap();
        let b64 = encode_payload(&payload);
        let decoded = STANDARD.decode(&b64).expect("valid base64");
        assert_eq!(decoded, payload.bytes());
    }

    #[test]
    fn image_data_carries_media_type() {
        let upload = Upload::new("image/jpeg", vec![0xFF, 0xD8, 0xFF]);
        let payload = prepare(Some(&upload)).unwrap();
        let data = to_image_data(&payload);
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(data.data, "/9j/");
    }
}
