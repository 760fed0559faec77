//! Pure Rust codec backend, statically linked.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::load_from_memory` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Dithered output has few distinct colours, so PNG and WebP stay lossless:
//! a lossy encoder would smear the dither pattern it is meant to carry.

use super::backend::{BackendError, ImageCodec};
use super::calculations::calculate_scaled_dimensions;
use super::params::{OutputFormat, Quality};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

/// AVIF encoder speed (1 = slowest/best, 10 = fastest).
const AVIF_SPEED: u8 = 6;

/// Largest RGBA buffer a resize may allocate: a 16384×16384 square.
const MAX_OUTPUT_BYTES: u64 = 16384 * 16384 * 4;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_failed(format: OutputFormat, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("{} encode failed: {}", format, e))
}

impl ImageCodec for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes)
            .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode image: {}", e)))
    }

    fn resize(&self, image: &DynamicImage, width: u32) -> Result<RgbaImage, BackendError> {
        if width == 0 {
            return Err(BackendError::ProcessingFailed(
                "Target width must be positive".into(),
            ));
        }
        let (w, h) = calculate_scaled_dimensions((image.width(), image.height()), width);
        let bytes = u64::from(w)
            .checked_mul(u64::from(h))
            .and_then(|px| px.checked_mul(4))
            .filter(|bytes| *bytes <= MAX_OUTPUT_BYTES);
        if bytes.is_none() {
            return Err(BackendError::ProcessingFailed(format!(
                "{w}x{h} output exceeds the {MAX_OUTPUT_BYTES} byte limit"
            )));
        }
        let rgba = image.to_rgba8();
        Ok(image::imageops::resize(&rgba, w, h, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        pixels: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let mut buf = Vec::new();
        let (width, height) = pixels.dimensions();
        match format {
            OutputFormat::Png => image::codecs::png::PngEncoder::new(&mut buf)
                .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| encode_failed(format, e))?,
            OutputFormat::Webp => image::codecs::webp::WebPEncoder::new_lossless(&mut buf)
                .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                .map_err(|e| encode_failed(format, e))?,
            OutputFormat::Avif => image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut buf,
                AVIF_SPEED,
                quality.value() as u8,
            )
            .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| encode_failed(format, e))?,
        }
        Ok(buf)
    }
}
