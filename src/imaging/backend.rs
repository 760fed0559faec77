//! Image codec backend trait and shared types.
//!
//! The [`ImageCodec`] trait defines the three operations the producer needs:
//! decode, resize and encode. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on top of the
//! `image` crate.

use super::params::{OutputFormat, Quality};
use image::{DynamicImage, RgbaImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image codec backends.
///
/// Every call works on in-memory buffers; the producer owns all file I/O.
/// Implementations must be `Sync` because sizes and formats are processed
/// on rayon workers.
pub trait ImageCodec: Sync {
    /// Decode raw source bytes (any supported input format).
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Resize to `width`, keeping the aspect ratio.
    fn resize(&self, image: &DynamicImage, width: u32) -> Result<RgbaImage, BackendError>;

    /// Encode pixels into `format`. `quality` only affects lossy formats.
    fn encode(
        &self,
        pixels: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
