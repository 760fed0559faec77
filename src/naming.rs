//! Deterministic derivative naming.
//!
//! Derivative filenames depend only on the source reference string, the
//! target width and the format:
//!
//! ```text
//! https://example.com/cat.jpg  →  3f1c0a9d22be-1800.webp
//!                                 3f1c0a9d22be-600.png
//! ```
//!
//! Two builds of the same site therefore write the same files, and two
//! different sources never collide in practice.

use crate::imaging::OutputFormat;
use sha2::{Digest, Sha256};

/// Number of hex digits of the SHA-256 digest kept in filenames.
pub const HASH_LENGTH: usize = 12;

/// First [`HASH_LENGTH`] lowercase hex digits of SHA-256 over the reference.
pub fn content_hash(source_ref: &str) -> String {
    let digest = Sha256::digest(source_ref.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(HASH_LENGTH);
    hex
}

/// `{hash}-{size}.{ext}`
pub fn derivative_filename(hash: &str, size: u32, format: OutputFormat) -> String {
    format!("{}-{}.{}", hash, size, format.extension())
}

/// Join a public folder and a filename with exactly one `/` between them.
///
/// `"/images"` + `"a.png"` → `"/images/a.png"`; `"/images/"` behaves the same.
pub fn public_path(image_folder: &str, filename: &str) -> String {
    format!("{}/{}", image_folder.trim_end_matches('/'), filename)
}
