//! Image pre-processing before upload: decode, downscale, re-encode.
//!
//! Failure anywhere falls back to the original bytes. Pre-processing may
//! never block an upload.

use bytes::Bytes;
use image::imageops::FilterType;
use tracing::{debug, warn};

use glance_shared::constants::{IMAGE_ENCODE_QUALITY, MAX_IMAGE_DIMENSION};
use glance_shared::SelectedFile;

use crate::kind;

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub data: Bytes,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub was_compressed: bool,
}

/// Decode, cap the longest edge, and re-encode as JPEG.
///
/// GIFs are exempt so animation survives. Anything undecodable ships
/// unmodified. CPU-bound; callers run it on a blocking thread.
pub fn prepare_image(file: &SelectedFile) -> PreparedImage {
    if kind::is_gif(file.mime_type.as_deref(), &file.file_name) {
        debug!(file = %file.file_name, "gif attachment, skipping re-encode");
        return PreparedImage {
            data: file.data.clone(),
            width: None,
            height: None,
            was_compressed: false,
        };
    }

    let decoded = match image::load_from_memory(&file.data) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(file = %file.file_name, error = %e, "image decode failed, sending original");
            return PreparedImage {
                data: file.data.clone(),
                width: None,
                height: None,
                was_compressed: false,
            };
        }
    };

    let (width, height) = (decoded.width(), decoded.height());
    let longest = width.max(height);
    let resized = if longest > MAX_IMAGE_DIMENSION {
        let scale = MAX_IMAGE_DIMENSION as f64 / longest as f64;
        let new_width = ((width as f64 * scale).round() as u32).max(1);
        let new_height = ((height as f64 * scale).round() as u32).max(1);
        decoded.resize_exact(new_width, new_height, FilterType::Lanczos3)
    } else {
        decoded
    };

    let (out_width, out_height) = (resized.width(), resized.height());
    let mut encoded = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
        std::io::Cursor::new(&mut encoded),
        IMAGE_ENCODE_QUALITY,
    );
    match resized.to_rgb8().write_with_encoder(encoder) {
        Ok(()) => PreparedImage {
            data: Bytes::from(encoded),
            width: Some(out_width),
            height: Some(out_height),
            was_compressed: true,
        },
        Err(e) => {
            warn!(file = %file.file_name, error = %e, "jpeg encode failed, sending original");
            PreparedImage {
                data: file.data.clone(),
                width: Some(width),
                height: Some(height),
                was_compressed: false,
            }
        }
    }
}
