//! Responsive `<picture>` markup.
//!
//! Turns a [`DerivativePlan`] into a `<picture>` fragment using
//! [Maud](https://maud.lambda.xyz/). The composer never touches the
//! filesystem: it only needs the plan, so it can run before any derivative
//! exists to check that a fallback is possible.
//!
//! ## Candidate Order
//!
//! `<source>` elements are grouped by format in preference order (AVIF,
//! WebP, PNG) and sorted by descending width inside each group. Browsers take
//! the first matching `<source>`, so every candidate but the smallest in its
//! group carries a `media="(min-width: Npx)"` condition; the smallest is the
//! group's catch-all.
//!
//! ```html
//! <picture>
//!   <source srcset="/images/ba7816bf8f01-1800.webp" type="image/webp" media="(min-width: 1800px)">
//!   <source srcset="/images/ba7816bf8f01-600.webp" type="image/webp">
//!   <source srcset="/images/ba7816bf8f01-1800.png" type="image/png" media="(min-width: 1800px)">
//!   <source srcset="/images/ba7816bf8f01-600.png" type="image/png">
//!   <img src="/images/ba7816bf8f01-1800.png" alt="...">
//! </picture>
//! ```
//!
//! The fallback `<img>` points at the largest PNG. When a caption is given
//! the picture is wrapped in `<figure>` with a `<figcaption>`.

use crate::imaging::OutputFormat;
use crate::plan::{DerivativeDescriptor, DerivativePlan};
use crate::types::ImageRequest;
use maud::{Markup, Render, html};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ComposeError {
    #[error("Plan has no {} derivative to use as the <img> fallback", OutputFormat::BASELINE)]
    PlanEmpty,
}

/// Markup-level data for one image.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageMetadata<'a> {
    pub alt: &'a str,
    pub caption: Option<&'a str>,
    /// Extra attributes for the fallback `<img>`.
    pub attributes: &'a [(String, String)],
}

impl<'a> From<&'a ImageRequest> for ImageMetadata<'a> {
    fn from(request: &'a ImageRequest) -> Self {
        Self {
            alt: &request.alt,
            caption: request.caption.as_deref(),
            attributes: &request.attributes,
        }
    }
}

/// One `<source>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate<'a> {
    pub descriptor: &'a DerivativeDescriptor,
    pub media: Option<String>,
}

impl SourceCandidate<'_> {
    pub fn mime_type(&self) -> &'static str {
        self.descriptor.format.mime_type()
    }
}

/// Ordered `<source>` candidates for `plan`.
pub fn source_candidates(plan: &DerivativePlan) -> Vec<SourceCandidate<'_>> {
    let mut candidates = Vec::with_capacity(plan.len());
    for format in OutputFormat::PREFERENCE {
        let mut group: Vec<&DerivativeDescriptor> =
            plan.iter().filter(|d| d.format == format).collect();
        group.sort_by(|a, b| b.size.cmp(&a.size));
        let last = group.len().saturating_sub(1);
        candidates.extend(group.into_iter().enumerate().map(|(i, descriptor)| {
            SourceCandidate {
                descriptor,
                media: (i < last).then(|| format!("(min-width: {}px)", descriptor.size)),
            }
        }));
    }
    candidates
}

/// Largest baseline-format descriptor.
pub fn fallback(plan: &DerivativePlan) -> Result<&DerivativeDescriptor, ComposeError> {
    plan.iter()
        .filter(|d| d.format == OutputFormat::BASELINE)
        .max_by_key(|d| d.size)
        .ok_or(ComposeError::PlanEmpty)
}

/// Render the responsive fragment.
pub fn compose(plan: &DerivativePlan, metadata: &ImageMetadata) -> Result<Markup, ComposeError> {
    let fallback = fallback(plan)?;
    let candidates = source_candidates(plan);
    let picture = html! {
        picture {
            @for candidate in &candidates {
                source
                    srcset=(candidate.descriptor.public_src_path)
                    type=(candidate.mime_type())
                    media=[candidate.media.as_deref()];
            }
            (FallbackImage {
                src: &fallback.public_src_path,
                alt: metadata.alt,
                attributes: metadata.attributes,
            })
        }
    };
    Ok(match metadata.caption {
        Some(caption) => html! {
            figure {
                (picture)
                figcaption { (caption) }
            }
        },
        None => picture,
    })
}

/// `<img>` with a runtime attribute list, which `html!` cannot express.
struct FallbackImage<'a> {
    src: &'a str,
    alt: &'a str,
    attributes: &'a [(String, String)],
}

impl Render for FallbackImage<'_> {
    fn render_to(&self, buffer: &mut String) {
        buffer.push_str("<img src=\"");
        self.src.render_to(buffer);
        buffer.push_str("\" alt=\"");
        self.alt.render_to(buffer);
        buffer.push('"');
        for (name, value) in self.attributes {
            if !is_passthrough_attribute(name) {
                continue;
            }
            buffer.push(' ');
            buffer.push_str(name);
            buffer.push_str("=\"");
            value.render_to(buffer);
            buffer.push('"');
        }
        buffer.push('>');
    }
}

/// Names we can emit verbatim, minus the ones the composer owns.
fn is_passthrough_attribute(name: &str) -> bool {
    let well_formed = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
    well_formed
        && !["src", "srcset", "alt"]
            .iter()
            .any(|owned| name.eq_ignore_ascii_case(owned))
}
