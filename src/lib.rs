//! # ditherpic
//!
//! Build-time responsive images with a dithered look. Point it at the HTML a
//! static site generator just wrote and every `<img>` becomes a `<picture>`
//! backed by a set of resized, palette-dithered derivatives in several
//! formats.
//!
//! # Architecture: One Plan, Two Consumers
//!
//! Each image goes through five stages:
//!
//! ```text
//! 1. Resolve   global options + preset/inline  →  ResolvedOptions
//! 2. Plan      source ref + options            →  DerivativePlan (sizes × formats)
//! 3. Locate    source ref                      →  bytes (HTTP or local file)
//! 4. Produce   bytes + plan                    →  files on disk
//! 5. Compose   plan + alt/caption              →  <picture> markup
//! ```
//!
//! The plan is computed once and handed to both the producer and the
//! composer, so the markup can never reference a file under a different name
//! than the one written. Filenames are derived from a hash of the source
//! reference, which makes rebuilds overwrite rather than accumulate.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`options`] | Four-layer option merge and validation |
//! | [`source`] | Remote/local classification and byte fetching |
//! | [`plan`] | Ordered derivative descriptors |
//! | [`naming`] | Content hash and filename convention |
//! | [`process`] | Resize → dither → encode → write, in parallel |
//! | [`markup`] | `<picture>` / `<figure>` rendering with Maud |
//! | [`pipeline`] | Runs the stages for one image |
//! | [`transform`] | Rewrites every `<img>` in an HTML document |
//! | [`config`] | `ditherpic.toml` loading, validation and stock config |
//! | [`types`] | Shared request and stage types |
//! | [`imaging`] | Codec backend and palette ditherer |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Explicit Global Options
//!
//! There is no process-wide configuration. A [`config::GlobalOptions`] value
//! is loaded once and passed into every entry point, so two sites can be
//! built side by side in one process and tests never share state.
//!
//! ## Fail Before Writing
//!
//! Everything that can be checked without I/O is checked first: an unknown
//! preset or a plan without a PNG fallback fails before the source is fetched
//! or a single file is written.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resizing and encoding use the `image` crate; AVIF goes through
//! `rav1e`. No ImageMagick or libvips to install, the binary is
//! self-contained.
//!
//! ## Bounded Parallelism
//!
//! Images in a document, sizes in an image and formats in a size all run as
//! rayon parallel iterators. The CLI sizes the global pool from
//! `[processing] max_processes`, capped at the number of cores.

pub mod config;
pub mod imaging;
pub mod markup;
pub mod naming;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod process;
pub mod source;
pub mod transform;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
