//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They are shared by the
//! planner (which names derivatives), the producer (which encodes them) and
//! the composer (which advertises them to browsers).
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`OutputFormat`]: the derivative file formats: AVIF, WebP and PNG.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// A derivative file format.
///
/// PNG is the baseline raster format every browser understands; it is the
/// only format that can serve as the `<img>` fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Avif,
    Webp,
    Png,
}

impl OutputFormat {
    /// Candidate preference order for `<source>` elements: most efficient first.
    pub const PREFERENCE: [OutputFormat; 3] =
        [OutputFormat::Avif, OutputFormat::Webp, OutputFormat::Png];

    /// The format every consumer can decode.
    pub const BASELINE: OutputFormat = OutputFormat::Png;

    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Avif => "avif",
            OutputFormat::Webp => "webp",
            OutputFormat::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Avif => "image/avif",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
