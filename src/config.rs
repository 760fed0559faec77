//! Plugin configuration module.
//!
//! Handles loading and validating `ditherpic.toml`. The file holds the
//! *global options*: a `[default]` layer applied to every image, named
//! `[presets.<name>]` bundles that content can reference by identifier,
//! and settings for the document transform and worker pool.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [default]
//! input_directory = "./src"      # Local image references resolve here
//! output_directory = "./_site"   # Site output root
//! image_folder = "/images"       # Derivatives land in output_directory + image_folder
//! sizes = [1800, 1024, 720, 600] # Target widths, largest first
//! formats = ["webp", "png"]      # Any of avif, webp, png (png is the fallback)
//! quality = 90                   # AVIF quality (1-100)
//!
//! [default.dithering]
//! mode = "error_diffusion"       # error_diffusion | ordered | random | threshold | none
//! kernel = "floyd_steinberg"     # floyd_steinberg | atkinson | sierra_lite
//! palette = ["#000", "#fff"]
//! threshold = 128
//! matrix = [4, 4]
//! serpentine = false
//!
//! [presets.duotone]
//! formats = ["avif", "png"]
//! [presets.duotone.dithering]
//! palette = ["#1d3557", "#f1faee"]
//!
//! [transform]
//! attribute = "src"              # <img> attribute holding the source reference
//!
//! [processing]
//! max_processes = 4              # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Every layer is sparse. A preset that only sets `dithering.palette` keeps
//! the threshold, mode and everything else from `[default]`, which in turn
//! only overrides the stock values it names. The merge itself lives in
//! [`options::resolve`](crate::options::resolve).
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DiffusionKernel, DitherMode, OutputFormat};
use crate::options::{OptionsRef, resolve};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "ditherpic.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Unknown preset {0:?}")]
    UnknownPreset(String),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Global options, loaded once and passed explicitly to every entry point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalOptions {
    /// Overrides applied to every image.
    pub default: OptionsOverride,
    /// Named option bundles, selected with [`OptionsRef::Preset`].
    pub presets: BTreeMap<String, OptionsOverride>,
    /// Whole-document transform settings.
    pub transform: TransformConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl GlobalOptions {
    /// Resolve the default layer and every preset once.
    ///
    /// Catches bad values at load time instead of on the first image that
    /// happens to use them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        resolve(self, &OptionsRef::default())?;
        for name in self.presets.keys() {
            resolve(self, &OptionsRef::Preset(name.clone())).map_err(|e| {
                ConfigError::Validation(format!("preset {name:?}: {e}"))
            })?;
        }
        if self.transform.attribute.trim().is_empty() {
            return Err(ConfigError::Validation(
                "transform.attribute must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// A sparse options layer: every key is optional.
///
/// Used for `[default]`, each `[presets.<name>]`, and inline per-image
/// overrides. Unset keys are skipped on serialization so merging only
/// touches what the layer names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptionsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<OutputFormat>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[serde(skip_serializing_if = "DitheringOverride::is_empty")]
    pub dithering: DitheringOverride,
}

/// Sparse counterpart of [`DitheringOptions`](crate::imaging::DitheringOptions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DitheringOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<DitherMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<DiffusionKernel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palette: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[u32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serpentine: Option<bool>,
}

impl DitheringOverride {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Whole-document transform settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformConfig {
    /// `<img>` attribute holding the source reference (e.g. `data-src`).
    pub attribute: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            attribute: "src".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Parse global options from TOML text and validate them.
pub fn parse_config(content: &str) -> Result<GlobalOptions, ConfigError> {
    let options: GlobalOptions = toml::from_str(content)?;
    options.validate()?;
    Ok(options)
}

/// Load global options from a config file.
///
/// A missing file yields the stock defaults. Present files are parsed,
/// unknown keys rejected, and every layer validated.
pub fn load_config(path: &Path) -> Result<GlobalOptions, ConfigError> {
    if !path.exists() {
        return Ok(GlobalOptions::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock `ditherpic.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# ditherpic Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Options resolve in four layers, each overriding the one before:
#   stock defaults -> [default] -> [presets.<name>] -> per-image inline options
#
# Each layer only needs the keys it wants to override. The [dithering]
# tables merge key by key, so a preset can change just the palette.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Defaults for every image
# ---------------------------------------------------------------------------
[default]
# Local (non-http) image references are read relative to this directory.
input_directory = "./src"

# Site output root; derivatives are written to output_directory + image_folder.
output_directory = "./_site"

# Public folder for derivatives, as referenced from the generated markup.
image_folder = "/images"

# Target widths in pixels (1-16384). Every size is generated in every format.
sizes = [1800, 1024, 720, 600]

# Derivative formats: any of "avif", "webp", "png".
# "png" is required: it is the <img> fallback for browsers without <picture>.
formats = ["webp", "png"]

# AVIF encoding quality (1 = worst, 100 = best). PNG and WebP are lossless.
quality = 90

# ---------------------------------------------------------------------------
# Dithering
# ---------------------------------------------------------------------------
[default.dithering]
# error_diffusion | ordered | random | threshold | none
mode = "error_diffusion"

# Error diffusion kernel: floyd_steinberg | atkinson | sierra_lite
kernel = "floyd_steinberg"

# Output colours, as #rgb or #rrggbb.
palette = ["#000", "#fff"]

# Quantisation point (0-255). Lower values favour lighter colours.
threshold = 128

# Ordered dithering matrix [width, height]; each 2, 4 or 8.
matrix = [4, 4]

# Alternate scan direction on odd rows (error diffusion only).
serpentine = false

# ---------------------------------------------------------------------------
# Presets, referenced by name from content
# ---------------------------------------------------------------------------
# [presets.duotone]
# formats = ["avif", "png"]
#
# [presets.duotone.dithering]
# palette = ["#1d3557", "#f1faee"]

# ---------------------------------------------------------------------------
# Whole-document transform
# ---------------------------------------------------------------------------
[transform]
# <img> attribute that holds the source reference.
attribute = "src"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
