//! Image processing in pure Rust, no system libraries required.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Resize** | Lanczos3, width-driven |
//! | **Dither** | [`PaletteDitherer`] (error diffusion, ordered, random, threshold) |
//! | **Encode** | PNG / lossless WebP / AVIF via the `image` codecs |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and matrix math (unit testable)
//! - **Parameters**: [`OutputFormat`] and [`Quality`]
//! - **Backend**: [`ImageCodec`] trait + [`RustBackend`]
//! - **Dither**: [`Ditherer`] trait + [`PaletteDitherer`]

pub mod backend;
mod calculations;
pub mod dither;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageCodec};
pub use dither::{DiffusionKernel, DitherError, DitherMode, Ditherer, DitheringOptions, PaletteDitherer};
pub use params::{OutputFormat, Quality};
pub use rust_backend::RustBackend;
