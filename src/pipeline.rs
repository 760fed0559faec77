//! Per-image pipeline.
//!
//! [`Pipeline::render_image`] runs one [`ImageRequest`] through every stage:
//!
//! ```text
//! resolve options → plan → compose check → fetch → produce → compose
//! ```
//!
//! The compose check runs before any I/O, so a plan without a PNG fallback
//! fails without fetching the source or writing a single file. The same goes
//! for an unknown preset, which fails in the resolve stage.
//!
//! The collaborators (codec, ditherer, HTTP fetcher) are type parameters so
//! tests can swap in mocks; [`Pipeline::standard`] wires up the production
//! ones. Global options are passed into every call rather than stored.

use crate::config::{ConfigError, GlobalOptions};
use crate::imaging::{Ditherer, ImageCodec, PaletteDitherer, RustBackend};
use crate::markup::{ComposeError, ImageMetadata, compose};
use crate::options::resolve;
use crate::plan::plan;
use crate::process::{ProcessEvent, ProduceError, produce, send};
use crate::source::{HttpFetch, HttpFetcher, SourceError, fetch_bytes};
use crate::types::{ImageRequest, Stage};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

/// A failed image, named by its source reference.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("{reference}: {error}")]
    Configuration {
        reference: String,
        #[source]
        error: ConfigError,
    },
    #[error("{reference}: {error}")]
    Fetch {
        reference: String,
        #[source]
        error: SourceError,
    },
    #[error("{reference}: {} failed: {error}", .error.stage())]
    Produce {
        reference: String,
        #[source]
        error: ProduceError,
    },
    #[error("{reference}: {error}")]
    Compose {
        reference: String,
        #[source]
        error: ComposeError,
    },
}

impl ImageError {
    pub fn reference(&self) -> &str {
        match self {
            ImageError::Configuration { reference, .. }
            | ImageError::Fetch { reference, .. }
            | ImageError::Produce { reference, .. }
            | ImageError::Compose { reference, .. } => reference,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ImageError::Configuration { .. } => Stage::Resolve,
            ImageError::Fetch { .. } => Stage::Fetch,
            ImageError::Produce { error, .. } => error.stage(),
            ImageError::Compose { .. } => Stage::Compose,
        }
    }
}

pub struct Pipeline<C, D, F> {
    codec: C,
    ditherer: D,
    fetcher: F,
    events: Option<Sender<ProcessEvent>>,
}

impl Pipeline<RustBackend, PaletteDitherer, HttpFetcher> {
    /// Pure-Rust codec, palette ditherer and a blocking HTTP client.
    pub fn standard() -> Result<Self, SourceError> {
        Ok(Self::new(
            RustBackend::new(),
            PaletteDitherer::new(),
            HttpFetcher::new()?,
        ))
    }
}

impl<C: ImageCodec, D: Ditherer, F: HttpFetch> Pipeline<C, D, F> {
    pub fn new(codec: C, ditherer: D, fetcher: F) -> Self {
        Self {
            codec,
            ditherer,
            fetcher,
            events: None,
        }
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: Sender<ProcessEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub(crate) fn events(&self) -> Option<&Sender<ProcessEvent>> {
        self.events.as_ref()
    }

    /// Produce the derivatives for `request` and return its `<picture>` markup.
    pub fn render_image(
        &self,
        global: &GlobalOptions,
        request: &ImageRequest,
    ) -> Result<String, ImageError> {
        let result = self.run(global, request);
        if let Err(e) = &result {
            warn!(source = %request.source, stage = %e.stage(), "image failed: {e}");
            send(self.events(), ProcessEvent::ImageFailed {
                source: request.source.clone(),
                stage: e.stage(),
                reason: e.to_string(),
            });
        }
        result
    }

    fn run(&self, global: &GlobalOptions, request: &ImageRequest) -> Result<String, ImageError> {
        let reference = || request.source.clone();

        let options = resolve(global, &request.options).map_err(|error| {
            ImageError::Configuration {
                reference: reference(),
                error,
            }
        })?;
        let plan = plan(&request.source, &options);
        let metadata = ImageMetadata::from(request);
        // Fails fast, before fetching or writing anything.
        compose(&plan, &metadata).map_err(|error| ImageError::Compose {
            reference: reference(),
            error,
        })?;

        send(self.events(), ProcessEvent::ImageStarted {
            source: request.source.clone(),
            derivatives: plan.len(),
        });

        let bytes = fetch_bytes(&request.source, &options, &self.fetcher).map_err(|error| {
            ImageError::Fetch {
                reference: reference(),
                error,
            }
        })?;
        let report = produce(
            &self.codec,
            &self.ditherer,
            &bytes,
            &plan,
            &options,
            self.events(),
        )
        .map_err(|error| ImageError::Produce {
            reference: reference(),
            error,
        })?;

        info!(source = %request.source, derivatives = report.written.len(), "image rendered");
        let fragment = compose(&plan, &metadata).map_err(|error| ImageError::Compose {
            reference: reference(),
            error,
        })?;
        Ok(fragment.into_string())
    }
}
