//! Shared test utilities.
//!
//! Source images are synthesized in memory so tests need no fixture files:
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = site_with_image("photos/cat.png", 64, 32);
//! let global = global_options_for(tmp.path());
//! ```

use crate::config::GlobalOptions;
use image::{ImageEncoder, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// Opaque horizontal grey gradient of the given size.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        let v = (x * 255 / width.max(2).saturating_sub(1)).min(255) as u8;
        Rgba([v, v, v, 255])
    })
}

/// PNG-encoded [`gradient`].
pub fn synthetic_png(width: u32, height: u32) -> Vec<u8> {
    let pixels = gradient(width, height);
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            pixels.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
    buf
}

// =========================================================================
// Site fixtures
// =========================================================================

/// Temp site with `src/<rel_path>` holding a synthetic PNG.
pub fn site_with_image(rel_path: &str, width: u32, height: u32) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("src").join(rel_path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, synthetic_png(width, height)).unwrap();
    tmp
}

/// Global options reading from `<root>/src` and writing to `<root>/_site`,
/// with small sizes to keep encodes fast.
pub fn global_options_for(root: &Path) -> GlobalOptions {
    let mut global = GlobalOptions::default();
    global.default.input_directory = Some(root.join("src"));
    global.default.output_directory = Some(root.join("_site"));
    global.default.sizes = Some(vec![32, 16]);
    global
}

/// All files below `dir`, sorted, relative to `dir`.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_png_decodes() {
        let img = image::load_from_memory(&synthetic_png(20, 10)).unwrap();
        assert_eq!((img.width(), img.height()), (20, 10));
    }

    #[test]
    fn gradient_spans_black_to_white() {
        let img = gradient(16, 1);
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(15, 0)[0], 255);
    }

    #[test]
    fn site_fixture_layout() {
        let tmp = site_with_image("a/b.png", 4, 4);
        assert_eq!(list_files(tmp.path()), vec![PathBuf::from("src/a/b.png")]);
    }
}
