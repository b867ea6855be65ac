//! Image encoding: raw upload bytes → base64 [`InputContent::Image`].
//!
//! Multimodal APIs take images as base64 inside the JSON request body, so the
//! bytes are passed through untouched. No re-encoding: an uploaded scan is
//! already in a format the model accepts, and transcoding would only cost
//! fidelity.

use crate::content::InputContent;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use tracing::debug;

/// Wrap image bytes as canonical image content.
pub fn encode_image(bytes: &[u8], mime_type: &str) -> InputContent {
    let data = STANDARD.encode(bytes);
    debug!("Encoded {} image → {} bytes base64", mime_type, data.len());

    InputContent::Image {
        mime_type: mime_type.to_string(),
        data,
    }
}

/// MIME type for a known image file extension (`png`, `jpg`, …).
pub fn image_mime_from_extension(ext: &str) -> Option<&'static str> {
    ImageFormat::from_extension(ext).map(|f| f.to_mime_type())
}

/// Sniff the image format from magic bytes.
///
/// Used only when an artifact arrives without a declared MIME type.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}
