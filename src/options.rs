//! Option resolution.
//!
//! Every image is processed with a [`ResolvedOptions`] built from four
//! layers, lowest to highest:
//!
//! ```text
//! stock defaults  →  [default]  →  [presets.<name>]  →  inline overrides
//! ```
//!
//! Layers are sparse [`OptionsOverride`] values. They are serialized to TOML
//! tables and folded with [`merge_toml`], so nested records (`dithering`)
//! merge key by key while arrays (`sizes`, `formats`, `palette`) replace the
//! lower layer wholesale. The merged table is deserialized back into
//! [`ResolvedOptions`] and validated.
//!
//! [`resolve`] is pure: it reads the global options it is handed and nothing
//! else.

use crate::config::{ConfigError, GlobalOptions, OptionsOverride, merge_toml};
use crate::imaging::{DitheringOptions, OutputFormat, Quality};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Widest derivative a plan may ask for, in pixels.
pub const MAX_SIZE: u32 = 16384;

/// Per-image options selector.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionsRef {
    /// Apply the named preset from [`GlobalOptions::presets`].
    Preset(String),
    /// Apply these overrides on top of the global defaults.
    Inline(OptionsOverride),
}

impl Default for OptionsRef {
    fn default() -> Self {
        OptionsRef::Inline(OptionsOverride::default())
    }
}

/// Fully merged options for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolvedOptions {
    /// Local references are read relative to this directory.
    pub input_directory: PathBuf,
    /// Site output root.
    pub output_directory: PathBuf,
    /// Public folder for derivatives, e.g. `/images`.
    pub image_folder: String,
    /// Target widths, in declared order.
    pub sizes: Vec<u32>,
    /// Derivative formats, in declared order.
    pub formats: Vec<OutputFormat>,
    /// AVIF quality (1-100).
    pub quality: u32,
    pub dithering: DitheringOptions,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            input_directory: PathBuf::from("./src"),
            output_directory: PathBuf::from("./_site"),
            image_folder: "/images".to_string(),
            sizes: vec![1800, 1024, 720, 600],
            formats: vec![OutputFormat::Webp, OutputFormat::Png],
            quality: 90,
            dithering: DitheringOptions::default(),
        }
    }
}

impl ResolvedOptions {
    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    /// Validate the merged result.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sizes.is_empty() {
            return Err(ConfigError::Validation("sizes must not be empty".into()));
        }
        if self.sizes.contains(&0) {
            return Err(ConfigError::Validation(
                "sizes must be positive widths".into(),
            ));
        }
        if let Some(too_wide) = self.sizes.iter().find(|s| **s > MAX_SIZE) {
            return Err(ConfigError::Validation(format!(
                "size {too_wide} exceeds the maximum of {MAX_SIZE}"
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.sizes.iter().find(|s| !seen.insert(**s)) {
            return Err(ConfigError::Validation(format!("duplicate size {dup}")));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::Validation("formats must not be empty".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.formats.iter().find(|f| !seen.insert(**f)) {
            return Err(ConfigError::Validation(format!("duplicate format {dup}")));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation(format!(
                "quality must be 1-100, got {}",
                self.quality
            )));
        }
        self.dithering
            .validate()
            .map_err(|e| ConfigError::Validation(format!("dithering: {e}")))?;
        Ok(())
    }
}

/// Stock defaults as a TOML value, the base of every merge.
fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ResolvedOptions::default())?)
}

/// Merge stock defaults, the global default layer, and the per-image layer.
///
/// An unknown preset name is an error; there is no fallback to the defaults.
pub fn resolve(
    global: &GlobalOptions,
    image_options: &OptionsRef,
) -> Result<ResolvedOptions, ConfigError> {
    let image_layer = match image_options {
        OptionsRef::Preset(name) => global
            .presets
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPreset(name.clone()))?,
        OptionsRef::Inline(overrides) => overrides,
    };

    let mut merged = stock_defaults_value()?;
    for layer in [&global.default, image_layer] {
        merged = merge_toml(merged, toml::Value::try_from(layer)?);
    }

    let resolved: ResolvedOptions = merged.try_into()?;
    resolved.validate()?;
    Ok(resolved)
}
