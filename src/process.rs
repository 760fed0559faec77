//! Derivative production.
//!
//! Takes the source bytes and a [`DerivativePlan`] and writes every planned
//! file. The work fans out in two levels on the current rayon pool:
//!
//! ```text
//! decode (once)
//!   ├── 1800px: resize → dither ─┬─ encode webp → write
//!   │                            └─ encode png  → write
//!   └──  600px: resize → dither ─┬─ encode webp → write
//!                                └─ encode png  → write
//! ```
//!
//! Each size is resized and dithered once and shared by all its formats.
//!
//! ## Failure Handling
//!
//! A failing derivative never stops its siblings. Failures are collected
//! with the stage they happened in; once all work has finished, any failure
//! turns the whole call into [`ProduceError::Derivatives`], which still
//! lists what was written. A decode failure stops everything since there is
//! nothing to resize.
//!
//! Output paths are fixed by the plan, so re-running overwrites the same
//! files.

use crate::imaging::{Ditherer, ImageCodec, OutputFormat, Quality};
use crate::options::ResolvedOptions;
use crate::plan::{DerivativeDescriptor, DerivativePlan};
use crate::types::Stage;
use image::RgbaImage;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

/// One derivative that could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeFailure {
    pub descriptor: DerivativeDescriptor,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ProduceError {
    #[error("Failed to decode source: {0}")]
    Decode(String),
    #[error("{} of {} derivatives failed", .failures.len(), .failures.len() + .written.len())]
    Derivatives {
        failures: Vec<DerivativeFailure>,
        written: Vec<DerivativeDescriptor>,
    },
}

impl ProduceError {
    /// Stage of the (first) failure.
    pub fn stage(&self) -> Stage {
        match self {
            ProduceError::Decode(_) => Stage::Decode,
            ProduceError::Derivatives { failures, .. } => failures
                .first()
                .map(|f| f.stage)
                .unwrap_or(Stage::Write),
        }
    }
}

/// Everything written by a successful [`produce`] call, in plan order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProduceReport {
    pub written: Vec<DerivativeDescriptor>,
}

/// Progress events, sent while images are processed.
///
/// Rendered for the terminal by [`crate::output::format_process_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    ImageStarted {
        source: String,
        derivatives: usize,
    },
    DerivativeWritten {
        size: u32,
        format: OutputFormat,
        path: PathBuf,
    },
    DerivativeFailed {
        size: u32,
        format: OutputFormat,
        stage: Stage,
        reason: String,
    },
    ImageFailed {
        source: String,
        stage: Stage,
        reason: String,
    },
    DocumentFinished {
        path: PathBuf,
        rewritten: usize,
        failed: usize,
    },
}

type Outcome<'a> = (&'a DerivativeDescriptor, Result<(), (Stage, String)>);

/// Decode `bytes` and write every derivative in `plan`.
pub fn produce(
    codec: &impl ImageCodec,
    ditherer: &impl Ditherer,
    bytes: &[u8],
    plan: &DerivativePlan,
    options: &ResolvedOptions,
    events: Option<&Sender<ProcessEvent>>,
) -> Result<ProduceReport, ProduceError> {
    let image = codec
        .decode(bytes)
        .map_err(|e| ProduceError::Decode(e.to_string()))?;
    let quality = options.quality();

    let per_size: Vec<Vec<Outcome>> = plan
        .sizes()
        .into_par_iter()
        .map(|size| {
            let descriptors = plan.for_size(size);
            let pixels = codec
                .resize(&image, size)
                .map_err(|e| (Stage::Resize, e.to_string()))
                .and_then(|resized| {
                    ditherer
                        .dither(&resized, &options.dithering)
                        .map_err(|e| (Stage::Dither, e.to_string()))
                });
            match pixels {
                Ok(pixels) => descriptors
                    .into_par_iter()
                    .map(|d| (d, write_derivative(codec, &pixels, d, quality)))
                    .collect(),
                Err(failure) => descriptors
                    .into_iter()
                    .map(|d| (d, Err(failure.clone())))
                    .collect(),
            }
        })
        .collect();

    let mut written = Vec::new();
    let mut failures = Vec::new();
    for (descriptor, result) in per_size.into_iter().flatten() {
        match result {
            Ok(()) => {
                debug!(file = %descriptor.output_file_path.display(), "wrote derivative");
                send(events, ProcessEvent::DerivativeWritten {
                    size: descriptor.size,
                    format: descriptor.format,
                    path: descriptor.output_file_path.clone(),
                });
                written.push(descriptor.clone());
            }
            Err((stage, reason)) => {
                warn!(file = %descriptor.filename, %stage, %reason, "derivative failed");
                send(events, ProcessEvent::DerivativeFailed {
                    size: descriptor.size,
                    format: descriptor.format,
                    stage,
                    reason: reason.clone(),
                });
                failures.push(DerivativeFailure {
                    descriptor: descriptor.clone(),
                    stage,
                    reason,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(ProduceReport { written })
    } else {
        Err(ProduceError::Derivatives { failures, written })
    }
}

fn write_derivative(
    codec: &impl ImageCodec,
    pixels: &RgbaImage,
    descriptor: &DerivativeDescriptor,
    quality: Quality,
) -> Result<(), (Stage, String)> {
    let encoded = codec
        .encode(pixels, descriptor.format, quality)
        .map_err(|e| (Stage::Encode, e.to_string()))?;
    if let Some(parent) = descriptor.output_file_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| (Stage::Write, e.to_string()))?;
    }
    std::fs::write(&descriptor.output_file_path, encoded)
        .map_err(|e| (Stage::Write, e.to_string()))
}

pub(crate) fn send(events: Option<&Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // Receiver gone means nobody is printing; processing carries on.
        tx.send(event).ok();
    }
}
