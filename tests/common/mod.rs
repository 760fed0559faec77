//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use ditherpic::config::GlobalOptions;
use image::{ImageEncoder, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// PNG bytes of an opaque diagonal grey gradient.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbaImage::from_fn(width, height, |x, y| {
        let v = ((x + y) * 255 / (width + height - 2).max(1)) as u8;
        Rgba([v, v, v, 255])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(pixels.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

/// A site root with `src/` (sources) and `_site/` (generated pages).
pub struct Site {
    pub root: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("src")).unwrap();
        std::fs::create_dir_all(root.path().join("_site")).unwrap();
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn add_source(&self, rel: &str, bytes: &[u8]) {
        let path = self.path().join("src").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    pub fn add_page(&self, rel: &str, html: &str) -> PathBuf {
        let path = self.path().join("_site").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, html).unwrap();
        path
    }

    /// Global options pointing at this site, with small sizes.
    pub fn global_options(&self) -> GlobalOptions {
        let toml = format!(
            r#"
[default]
input_directory = {src:?}
output_directory = {out:?}
sizes = [48, 24]
formats = ["webp", "png"]
"#,
            src = self.path().join("src").display().to_string(),
            out = self.path().join("_site").display().to_string(),
        );
        ditherpic::config::parse_config(&toml).unwrap()
    }

    /// Derivative files, sorted by name.
    pub fn derivatives(&self) -> Vec<PathBuf> {
        let dir = self.path().join("_site/images");
        let mut files: Vec<PathBuf> = match std::fs::read_dir(&dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }
}
