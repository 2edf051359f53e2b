//! Photo compression for the feature-extraction request
//!
//! Camera photos are far larger than the vision service needs. The photo is
//! downscaled so its longest edge fits `max_dimension` and re-encoded as
//! JPEG, which bounds the request payload.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

use super::frame::CapturedFrame;
use crate::config::CompressionConfig;

/// A compressed JPEG ready for upload
#[derive(Debug, Clone)]
pub struct CompressedImage {
    /// JPEG bytes
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CompressedImage {
    /// Standard base64 encoding of the JPEG bytes
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Decode, downscale and re-encode a captured photo
pub fn compress_frame(
    frame: &CapturedFrame,
    settings: &CompressionConfig,
) -> Result<CompressedImage> {
    let image = image::load_from_memory(&frame.data).context("Failed to decode captured photo")?;
    let (orig_width, orig_height) = (image.width(), image.height());

    let max_dimension = settings.max_dimension.max(1);
    let image = if orig_width.max(orig_height) > max_dimension {
        // Aspect ratio is preserved; the result fits inside the bounding box
        image.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        image
    };

    let rgb = image.to_rgb8();
    let quality = settings.jpeg_quality.clamp(1, 100);

    let mut bytes = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder
            .encode_image(&rgb)
            .context("Failed to encode compressed photo")?;
    }

    debug!(
        "Compressed photo {}x{} ({} bytes) -> {}x{} ({} bytes)",
        orig_width,
        orig_height,
        frame.len(),
        rgb.width(),
        rgb.height(),
        bytes.len()
    );

    Ok(CompressedImage {
        bytes,
        width: rgb.width(),
        height: rgb.height(),
    })
}
