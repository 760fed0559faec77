//! Palette dithering.
//!
//! The [`Ditherer`] trait is the seam between the producer and whatever
//! quantises pixels. [`PaletteDitherer`] is the built-in implementation: it
//! maps every pixel onto a fixed palette using one of four strategies.
//!
//! | Mode | Behaviour |
//! |---|---|
//! | `error_diffusion` | Quantisation error spread to neighbours with a [`DiffusionKernel`], optional serpentine scan |
//! | `ordered` | Bayer matrix offsets of `matrix` dimensions |
//! | `random` | Seeded uniform noise, identical output for identical input |
//! | `threshold` | Nearest palette colour, no spreading |
//! | `none` | Pixels pass through untouched |
//!
//! `threshold` (0–255, default 128) shifts the quantisation point in every
//! mode: lower values push pixels towards the lighter palette entries.
//! Alpha is never dithered.

use super::calculations::bayer_matrix;
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed seed so `random` mode is reproducible across builds.
const RANDOM_SEED: u64 = 0x00d1_7e4e;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DitherError {
    #[error("Palette must contain at least one colour")]
    EmptyPalette,
    #[error("Invalid palette colour {0:?} (expected #rgb or #rrggbb)")]
    InvalidColor(String),
    #[error("Unsupported matrix dimension {0} (expected 2, 4 or 8)")]
    InvalidMatrix(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitherMode {
    ErrorDiffusion,
    Ordered,
    Random,
    Threshold,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffusionKernel {
    FloydSteinberg,
    Atkinson,
    SierraLite,
}

impl DiffusionKernel {
    /// `(dx, dy, weight)` entries and the shared divisor.
    ///
    /// ```text
    /// floyd_steinberg      atkinson           sierra_lite
    ///      X 7                X 1 1              X 2
    ///    3 5 1              1 1 1              1 1
    ///                         1
    /// ```
    fn entries(self) -> (&'static [(i32, i32, f32)], f32) {
        match self {
            DiffusionKernel::FloydSteinberg => {
                (&[(1, 0, 7.0), (-1, 1, 3.0), (0, 1, 5.0), (1, 1, 1.0)], 16.0)
            }
            // Spreads 6/8 of the error; the loss keeps small palettes crisp.
            DiffusionKernel::Atkinson => (
                &[
                    (1, 0, 1.0),
                    (2, 0, 1.0),
                    (-1, 1, 1.0),
                    (0, 1, 1.0),
                    (1, 1, 1.0),
                    (0, 2, 1.0),
                ],
                8.0,
            ),
            DiffusionKernel::SierraLite => (&[(1, 0, 2.0), (-1, 1, 1.0), (0, 1, 1.0)], 4.0),
        }
    }
}

/// Configuration consumed by the ditherer.
///
/// The option resolver merges this record key by key across layers; the
/// rest of the pipeline only passes it through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DitheringOptions {
    pub mode: DitherMode,
    /// Error-diffusion kernel (ignored by the other modes).
    pub kernel: DiffusionKernel,
    /// Output colours as `#rgb` / `#rrggbb`.
    pub palette: Vec<String>,
    pub threshold: u8,
    /// Ordered-dither matrix as `[width, height]`, each 2, 4 or 8.
    pub matrix: [u32; 2],
    /// Alternate scan direction on odd rows (error diffusion only).
    pub serpentine: bool,
}

impl Default for DitheringOptions {
    fn default() -> Self {
        Self {
            mode: DitherMode::ErrorDiffusion,
            kernel: DiffusionKernel::FloydSteinberg,
            palette: vec!["#000".to_string(), "#fff".to_string()],
            threshold: 128,
            matrix: [4, 4],
            serpentine: false,
        }
    }
}

impl DitheringOptions {
    /// Check the palette and matrix without touching any pixels.
    pub fn validate(&self) -> Result<(), DitherError> {
        parse_palette(&self.palette)?;
        for dim in self.matrix {
            if !matches!(dim, 2 | 4 | 8) {
                return Err(DitherError::InvalidMatrix(dim));
            }
        }
        Ok(())
    }
}

/// Parse `#rgb` or `#rrggbb` into an RGB triple.
pub fn parse_hex_color(value: &str) -> Result<[u8; 3], DitherError> {
    let invalid = || DitherError::InvalidColor(value.to_string());
    let hex = value.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = channel(&c.to_string())?;
                rgb[i] = v * 17;
            }
            Ok(rgb)
        }
        6 => Ok([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        _ => Err(invalid()),
    }
}

pub fn parse_palette(colors: &[String]) -> Result<Vec<[u8; 3]>, DitherError> {
    if colors.is_empty() {
        return Err(DitherError::EmptyPalette);
    }
    colors.iter().map(|c| parse_hex_color(c)).collect()
}

/// Trait for dithering implementations.
///
/// Runs once per resized image; the result is shared read-only by every
/// format encode at that size, so implementations must be `Sync`.
pub trait Ditherer: Sync {
    fn dither(
        &self,
        pixels: &RgbaImage,
        options: &DitheringOptions,
    ) -> Result<RgbaImage, DitherError>;
}

/// Built-in fixed-palette ditherer.
///
/// See the [module docs](self) for the supported modes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaletteDitherer;

impl PaletteDitherer {
    pub fn new() -> Self {
        Self
    }
}

impl Ditherer for PaletteDitherer {
    fn dither(
        &self,
        pixels: &RgbaImage,
        options: &DitheringOptions,
    ) -> Result<RgbaImage, DitherError> {
        if options.mode == DitherMode::None {
            return Ok(pixels.clone());
        }
        options.validate()?;
        let palette = parse_palette(&options.palette)?;
        let bias = 128.0 - options.threshold as f32;
        // Distance between neighbouring palette levels, used to scale noise.
        let spread = 255.0 / (palette.len().max(2) - 1) as f32;

        let width = pixels.width() as usize;
        let height = pixels.height() as usize;
        let mut work: Vec<[f32; 3]> = pixels
            .pixels()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        let mut out = pixels.clone();

        match options.mode {
            DitherMode::ErrorDiffusion => {
                let (entries, divisor) = options.kernel.entries();
                for y in 0..height {
                    let reverse = options.serpentine && y % 2 == 1;
                    for step in 0..width {
                        let x = if reverse { width - 1 - step } else { step };
                        let idx = y * width + x;
                        let value = work[idx];
                        let chosen = nearest(&palette, offset(value, bias));
                        put(&mut out, x, y, chosen);

                        let error = [
                            (value[0] - chosen[0] as f32).clamp(-255.0, 255.0),
                            (value[1] - chosen[1] as f32).clamp(-255.0, 255.0),
                            (value[2] - chosen[2] as f32).clamp(-255.0, 255.0),
                        ];
                        for &(dx, dy, weight) in entries {
                            let dx = if reverse { -dx } else { dx };
                            let nx = x as i64 + dx as i64;
                            let ny = y + dy as usize;
                            if nx < 0 || nx >= width as i64 || ny >= height {
                                continue;
                            }
                            let target = &mut work[ny * width + nx as usize];
                            for c in 0..3 {
                                target[c] += error[c] * weight / divisor;
                            }
                        }
                    }
                }
            }
            DitherMode::Ordered => {
                let [mw, mh] = options.matrix;
                let side = mw.max(mh);
                let matrix = bayer_matrix(side);
                let cells = (side * side) as f32;
                for y in 0..height {
                    for x in 0..width {
                        let mx = x as u32 % mw;
                        let my = y as u32 % mh;
                        let cell = matrix[(my * side + mx) as usize] as f32;
                        let noise = ((cell + 0.5) / cells - 0.5) * spread;
                        let chosen = nearest(&palette, offset(work[y * width + x], bias + noise));
                        put(&mut out, x, y, chosen);
                    }
                }
            }
            DitherMode::Random => {
                let mut rng = StdRng::seed_from_u64(RANDOM_SEED);
                for y in 0..height {
                    for x in 0..width {
                        let noise = rng.gen_range(-0.5f32..0.5) * spread;
                        let chosen = nearest(&palette, offset(work[y * width + x], bias + noise));
                        put(&mut out, x, y, chosen);
                    }
                }
            }
            DitherMode::Threshold => {
                for y in 0..height {
                    for x in 0..width {
                        let chosen = nearest(&palette, offset(work[y * width + x], bias));
                        put(&mut out, x, y, chosen);
                    }
                }
            }
            DitherMode::None => {}
        }

        Ok(out)
    }
}

fn offset(value: [f32; 3], by: f32) -> [f32; 3] {
    [value[0] + by, value[1] + by, value[2] + by]
}

/// Closest palette entry by squared RGB distance; ties go to the earlier entry.
fn nearest(palette: &[[u8; 3]], value: [f32; 3]) -> [u8; 3] {
    let mut best = palette[0];
    let mut best_distance = f32::MAX;
    for &candidate in palette {
        let distance: f32 = (0..3)
            .map(|c| {
                let d = value[c] - candidate[c] as f32;
                d * d
            })
            .sum();
        if distance < best_distance {
            best = candidate;
            best_distance = distance;
        }
    }
    best
}

fn put(out: &mut RgbaImage, x: usize, y: usize, rgb: [u8; 3]) {
    let pixel = out.get_pixel_mut(x as u32, y as u32);
    pixel[0] = rgb[0];
    pixel[1] = rgb[1];
    pixel[2] = rgb[2];
}
