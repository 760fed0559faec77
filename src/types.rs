//! Shared types used across the pipeline stages.

use crate::options::OptionsRef;
use serde::Serialize;
use std::fmt;

/// One image to render: a source reference plus the metadata that ends up
/// in the markup.
///
/// Built once (by the document transform or a direct caller) and never
/// mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageRequest {
    /// Remote URL or site-relative local path.
    pub source: String,
    pub alt: String,
    pub caption: Option<String>,
    pub options: OptionsRef,
    /// Extra attributes copied onto the fallback `<img>` (class, loading, ...).
    /// `src` and `alt` are never part of this list.
    pub attributes: Vec<(String, String)>,
}

impl ImageRequest {
    pub fn new(source: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            alt: alt.into(),
            ..Default::default()
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_options(mut self, options: OptionsRef) -> Self {
        self.options = options;
        self
    }
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolve,
    Fetch,
    Decode,
    Resize,
    Dither,
    Encode,
    Write,
    Compose,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Fetch => "fetch",
            Stage::Decode => "decode",
            Stage::Resize => "resize",
            Stage::Dither => "dither",
            Stage::Encode => "encode",
            Stage::Write => "write",
            Stage::Compose => "compose",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let request = ImageRequest::new("/a.jpg", "A")
            .with_caption("Cap")
            .with_options(OptionsRef::Preset("duotone".into()));
        assert_eq!(request.source, "/a.jpg");
        assert_eq!(request.alt, "A");
        assert_eq!(request.caption.as_deref(), Some("Cap"));
        assert_eq!(request.options, OptionsRef::Preset("duotone".into()));
        assert!(request.attributes.is_empty());
    }

    #[test]
    fn stage_display_matches_serde_name() {
        assert_eq!(Stage::Encode.to_string(), "encode");
        assert_eq!(serde_json::to_string(&Stage::Write).unwrap(), "\"write\"");
    }
}
