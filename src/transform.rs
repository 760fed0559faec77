//! Whole-document transform.
//!
//! Rewrites every `<img>` in a generated HTML page into a responsive
//! `<picture>`:
//!
//! ```text
//! <p><img src="/photos/cat.jpg" alt="Cat" class="wide"></p>
//!                     ↓
//! <p><picture><source ...>...<img src="/images/…-1800.png" alt="Cat" class="wide"></picture></p>
//! ```
//!
//! Only output paths ending in `.html` are touched; anything else passes
//! through unchanged. The document is scanned token by token with a
//! quote-aware regex and each `<img>` tag's attributes are parsed with
//! `scraper`; the document is otherwise never re-serialized, so everything
//! outside the rewritten tags is preserved byte for byte.
//!
//! An `<img>` is left alone when it is not markup the browser would render
//! as a plain image:
//!
//! | Context | Example |
//! |---|---|
//! | comment | `<!-- <img src="a.jpg"> -->` |
//! | existing `<picture>` | `<picture><source ...><img src="a.jpg"></picture>` |
//! | raw text or inert content | `<script>`, `<style>`, `<textarea>`, `<template>`, `<noscript>` |
//! | attribute value | `<a title="<img src=a.jpg>">` |
//!
//! Skipping existing `<picture>` elements also makes the transform
//! idempotent: a second run over its own output changes nothing.
//!
//! The source reference is read from `transform.attribute` (`src` unless
//! configured otherwise). Tags without a source, or with a `data:` URI, are
//! left alone. Images render concurrently; a failed image keeps its original
//! tag and is reported in [`DocumentOutcome::failures`].

use crate::config::GlobalOptions;
use crate::imaging::{Ditherer, ImageCodec};
use crate::pipeline::{ImageError, Pipeline};
use crate::process::{ProcessEvent, send};
use crate::source::HttpFetch;
use crate::types::ImageRequest;
use rayon::prelude::*;
use regex::Regex;
use scraper::{Html, Selector};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{} image(s) failed in {}", .failures.len(), .path.display())]
    Images {
        path: PathBuf,
        failures: Vec<ImageError>,
    },
}

/// Result of transforming one document.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    /// The document with every successful image replaced.
    pub html: String,
    /// Number of `<img>` tags replaced.
    pub rewritten: usize,
    /// Images that failed; their tags are left as they were.
    pub failures: Vec<ImageError>,
}

impl DocumentOutcome {
    fn unchanged(path: &Path, content: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            html: content.to_string(),
            rewritten: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// The rewritten document, or every image failure.
    pub fn into_result(self) -> Result<String, TransformError> {
        if self.failures.is_empty() {
            Ok(self.html)
        } else {
            Err(TransformError::Images {
                path: self.path,
                failures: self.failures,
            })
        }
    }
}

/// Elements whose content is never rewritten.
const OPAQUE_ELEMENTS: [&str; 6] = [
    "picture", "template", "script", "noscript", "style", "textarea",
];

/// Tokenizer for the parts of a document that can hide an `<img>`.
///
/// Alternatives are tried leftmost-first: comments and opaque elements are
/// consumed whole (up to end of input when unterminated), then `<img>` tags
/// (captured as `img`), then any other start tag so `<img>` text inside its
/// attribute values is skipped. Quoted attribute values may contain `>`.
fn markup_token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        let mut pattern = String::from(r"(?is)<!--.*?(?:-->|\z)");
        for name in OPAQUE_ELEMENTS {
            pattern.push_str(&format!(r"|<{name}[\s/>].*?(?:</{name}\s*>|\z)"));
        }
        pattern.push_str(r#"|(?P<img><img(?:[\s/](?:[^>"']|"[^"]*"|'[^']*')*)?>)"#);
        pattern.push_str(r#"|<[a-z][^\s/>]*(?:[^>"']|"[^"]*"|'[^']*')*>"#);
        Regex::new(&pattern).expect("Invalid regex")
    })
}

fn img_selector() -> &'static Selector {
    static IMG: OnceLock<Selector> = OnceLock::new();
    IMG.get_or_init(|| Selector::parse("img").expect("Invalid selector"))
}

pub fn is_html_output(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
}

/// Build the request for one `<img>` tag, or `None` when it has nothing to
/// process.
pub fn request_from_tag(tag: &str, source_attribute: &str) -> Option<ImageRequest> {
    let fragment = Html::parse_fragment(tag);
    let element = fragment.select(img_selector()).next()?;
    let img = element.value();

    let source_attribute = source_attribute.to_ascii_lowercase();
    let source = img.attr(&source_attribute)?.trim();
    if source.is_empty() || source.get(..5).is_some_and(|s| s.eq_ignore_ascii_case("data:")) {
        return None;
    }

    let mut attributes: Vec<(String, String)> = img
        .attrs()
        .filter(|(name, _)| {
            !matches!(*name, "src" | "alt" | "srcset") && *name != source_attribute
        })
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    // Parsed attribute order is not guaranteed; sorting keeps output stable.
    attributes.sort();

    Some(ImageRequest {
        source: source.to_string(),
        alt: img.attr("alt").unwrap_or_default().to_string(),
        attributes,
        ..Default::default()
    })
}

/// Find the processable `<img>` tags in `content`, in document order.
///
/// Tags in comments, opaque elements or attribute values are not returned.
pub fn find_images(content: &str, source_attribute: &str) -> Vec<(Range<usize>, ImageRequest)> {
    markup_token_regex()
        .captures_iter(content)
        .filter_map(|caps| caps.name("img"))
        .filter_map(|m| match request_from_tag(m.as_str(), source_attribute) {
            Some(request) => Some((m.range(), request)),
            None => {
                debug!(tag = m.as_str(), "skipping <img> without a usable source");
                None
            }
        })
        .collect()
}

/// Rewrite every `<img>` in `content`.
///
/// `output_path` is where the document will be written; only `.html` paths
/// are transformed.
pub fn transform_document<C: ImageCodec, D: Ditherer, F: HttpFetch>(
    pipeline: &Pipeline<C, D, F>,
    global: &GlobalOptions,
    content: &str,
    output_path: &Path,
) -> DocumentOutcome {
    if !is_html_output(output_path) {
        return DocumentOutcome::unchanged(output_path, content);
    }

    let images = find_images(content, &global.transform.attribute);
    if images.is_empty() {
        return DocumentOutcome::unchanged(output_path, content);
    }

    // Identical tags render once.
    let mut unique: Vec<&ImageRequest> = Vec::new();
    let slots: Vec<usize> = images
        .iter()
        .map(|(_, request)| match unique.iter().position(|u| *u == request) {
            Some(i) => i,
            None => {
                unique.push(request);
                unique.len() - 1
            }
        })
        .collect();
    let results: Vec<Result<String, ImageError>> = unique
        .par_iter()
        .map(|request| pipeline.render_image(global, request))
        .collect();

    let mut html = String::with_capacity(content.len());
    let mut rewritten = 0;
    let mut last = 0;
    for ((range, _), slot) in images.iter().zip(slots) {
        html.push_str(&content[last..range.start]);
        match &results[slot] {
            Ok(fragment) => {
                html.push_str(fragment);
                rewritten += 1;
            }
            Err(_) => html.push_str(&content[range.clone()]),
        }
        last = range.end;
    }
    html.push_str(&content[last..]);
    let failures: Vec<ImageError> = results.into_iter().filter_map(Result::err).collect();

    info!(
        path = %output_path.display(),
        rewritten,
        failed = failures.len(),
        "document transformed"
    );
    send(pipeline.events(), ProcessEvent::DocumentFinished {
        path: output_path.to_path_buf(),
        rewritten,
        failed: failures.len(),
    });

    DocumentOutcome {
        path: output_path.to_path_buf(),
        html,
        rewritten,
        failures,
    }
}

/// Transform an HTML file in place.
///
/// The file is only rewritten when at least one image was replaced.
pub fn transform_file<C: ImageCodec, D: Ditherer, F: HttpFetch>(
    pipeline: &Pipeline<C, D, F>,
    global: &GlobalOptions,
    path: &Path,
) -> Result<DocumentOutcome, TransformError> {
    let content = std::fs::read_to_string(path)?;
    let outcome = transform_document(pipeline, global, &content, path);
    if outcome.rewritten > 0 {
        std::fs::write(path, &outcome.html)?;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::PaletteDitherer;
    use crate::imaging::backend::tests::MockCodec;
    use crate::source::tests::StaticFetcher;
    use crate::test_helpers::{global_options_for, list_files};
    use crate::types::Stage;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn pipeline_with(urls: &[&str]) -> Pipeline<MockCodec, PaletteDitherer, StaticFetcher> {
        let fetcher = urls
            .iter()
            .fold(StaticFetcher::new(), |f, url| f.with(url, 200, b"img"));
        Pipeline::new(MockCodec::new(), PaletteDitherer, fetcher)
    }

    fn page() -> &'static Path {
        Path::new("out/index.html")
    }

    // =========================================================================
    // Tag parsing
    // =========================================================================

    #[test]
    fn request_from_simple_tag() {
        let request =
            request_from_tag(r#"<img src="/a.jpg" alt="An A" class="wide" loading="lazy">"#, "src")
                .unwrap();
        assert_eq!(request.source, "/a.jpg");
        assert_eq!(request.alt, "An A");
        assert_eq!(request.caption, None);
        assert_eq!(
            request.attributes,
            vec![
                ("class".to_string(), "wide".to_string()),
                ("loading".to_string(), "lazy".to_string()),
            ]
        );
    }

    #[test]
    fn request_uses_configured_attribute() {
        let request =
            request_from_tag(r#"<img src="/placeholder.gif" data-src="/real.jpg">"#, "data-src")
                .unwrap();
        assert_eq!(request.source, "/real.jpg");
        assert!(request.attributes.is_empty());
    }

    #[test]
    fn request_skips_missing_empty_and_data_sources() {
        assert_eq!(request_from_tag(r#"<img alt="x">"#, "src"), None);
        assert_eq!(request_from_tag(r#"<img src="  ">"#, "src"), None);
        assert_eq!(request_from_tag(r#"<img src="DATA:image/png;base64,AAAA">"#, "src"), None);
        assert_eq!(request_from_tag(r#"<img src="/a.jpg">"#, "data-src"), None);
    }

    #[test]
    fn request_alt_defaults_to_empty() {
        let request = request_from_tag(r#"<img src="a.jpg">"#, "src").unwrap();
        assert_eq!(request.alt, "");
    }

    #[test]
    fn find_images_handles_case_quotes_and_self_closing() {
        let content = concat!(
            r#"<IMG SRC="/upper.jpg">"#,
            r#"<img alt='a > b' src='/quoted.jpg'/>"#,
            r#"<imgx src="/not-an-img.jpg">"#,
            r#"<img src="data:image/gif;base64,R0lG">"#,
        );
        let sources: Vec<String> = find_images(content, "src")
            .into_iter()
            .map(|(_, r)| r.source)
            .collect();
        assert_eq!(sources, vec!["/upper.jpg", "/quoted.jpg"]);
    }

    #[test]
    fn find_images_ranges_cover_whole_tag() {
        let content = r#"<p>x<img alt="1 > 0" src="/a.jpg">y</p>"#;
        let images = find_images(content, "src");
        assert_eq!(&content[images[0].0.clone()], r#"<img alt="1 > 0" src="/a.jpg">"#);
    }

    fn sources(content: &str) -> Vec<String> {
        find_images(content, "src")
            .into_iter()
            .map(|(_, r)| r.source)
            .collect()
    }

    #[test]
    fn find_images_skips_comments() {
        let content = concat!(
            r#"<!-- <img src="/old.jpg"> -->"#,
            r#"<img src="/new.jpg">"#,
            r#"<!-- unterminated <img src="/x.jpg">"#,
        );
        assert_eq!(sources(content), vec!["/new.jpg"]);
    }

    #[test]
    fn find_images_skips_existing_pictures() {
        let content = concat!(
            r#"<picture><source srcset="/hand.webp" type="image/webp"><img src="/hand.png"></picture>"#,
            r#"<PICTURE class="x"><img src="/upper.png"></PICTURE>"#,
            r#"<img src="/plain.jpg">"#,
        );
        assert_eq!(sources(content), vec!["/plain.jpg"]);
    }

    #[test]
    fn find_images_skips_opaque_elements() {
        let content = concat!(
            r#"<script>document.write('<img src="/script.jpg">');</script>"#,
            r#"<template><img src="/template.jpg"></template>"#,
            r#"<noscript><img src="/noscript.jpg"></noscript>"#,
            r#"<textarea><img src="/textarea.jpg"></textarea>"#,
            r#"<template-card><img src="/custom.jpg"></template-card>"#,
        );
        assert_eq!(sources(content), vec!["/custom.jpg"]);
    }

    #[test]
    fn find_images_skips_attribute_values() {
        let content = r#"<a title="<img src='/attr.jpg'>" href="/"><img src="/real.jpg"></a>"#;
        let images = find_images(content, "src");
        assert_eq!(images.len(), 1);
        assert_eq!(&content[images[0].0.clone()], r#"<img src="/real.jpg">"#);
    }

    #[test]
    fn html_output_detection() {
        assert!(is_html_output(Path::new("a/index.html")));
        assert!(is_html_output(Path::new("A.HTML")));
        assert!(!is_html_output(Path::new("feed.xml")));
        assert!(!is_html_output(Path::new("style.css")));
        assert!(!is_html_output(Path::new("html")));
    }

    // =========================================================================
    // Document transform
    // =========================================================================

    #[test]
    fn non_html_output_passes_through() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&["https://x.test/a.jpg"]);
        let content = r#"<img src="https://x.test/a.jpg">"#;

        let outcome = transform_document(
            &pipeline,
            &global_options_for(tmp.path()),
            content,
            Path::new("out/feed.xml"),
        );
        assert_eq!(outcome.html, content);
        assert_eq!(outcome.rewritten, 0);
        assert!(pipeline.fetcher().get_requests().is_empty());
    }

    #[test]
    fn rewrites_images_and_preserves_surroundings() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&["https://x.test/a.jpg"]);
        let content = "<!doctype html>\n<body>\n  <p>Before <img src=\"https://x.test/a.jpg\" alt=\"A\"> after</p>\n</body>\n";

        let outcome = transform_document(&pipeline, &global_options_for(tmp.path()), content, page());
        assert_eq!(outcome.rewritten, 1);
        assert!(outcome.is_clean());
        assert!(outcome.html.starts_with("<!doctype html>\n<body>\n  <p>Before <picture>"));
        assert!(outcome.html.ends_with("</picture> after</p>\n</body>\n"));
        assert!(outcome.html.contains(r#"alt="A">"#));
        assert_eq!(list_files(&tmp.path().join("_site/images")).len(), 4);
    }

    #[test]
    fn failed_image_keeps_original_tag() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&["https://x.test/ok.jpg"]);
        let content = concat!(
            r#"<img src="https://x.test/ok.jpg">"#,
            "|",
            r#"<img src="https://x.test/gone.jpg" class="keep">"#,
        );

        let outcome = transform_document(&pipeline, &global_options_for(tmp.path()), content, page());
        assert_eq!(outcome.rewritten, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].reference(), "https://x.test/gone.jpg");
        assert_eq!(outcome.failures[0].stage(), Stage::Fetch);
        assert!(outcome.html.starts_with("<picture>"));
        assert!(outcome.html.ends_with(r#"|<img src="https://x.test/gone.jpg" class="keep">"#));

        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, TransformError::Images { failures, .. } if failures.len() == 1));
    }

    #[test]
    fn identical_tags_render_once() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&["https://x.test/a.jpg"]);
        let tag = r#"<img src="https://x.test/a.jpg">"#;
        let content = format!("{tag}{tag}");

        let outcome = transform_document(&pipeline, &global_options_for(tmp.path()), &content, page());
        assert_eq!(outcome.rewritten, 2);
        assert_eq!(pipeline.fetcher().get_requests().len(), 1);
        let half = outcome.html.len() / 2;
        assert_eq!(outcome.html[..half], outcome.html[half..]);
    }

    #[test]
    fn second_pass_over_output_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&["https://x.test/a.jpg"]);
        let global = global_options_for(tmp.path());
        let content = r#"<p><img src="https://x.test/a.jpg" alt="A"></p>"#;

        let first = transform_document(&pipeline, &global, content, page());
        assert_eq!(first.rewritten, 1);
        let second = transform_document(&pipeline, &global, &first.html, page());
        assert_eq!(second.rewritten, 0);
        assert!(second.is_clean());
        assert_eq!(second.html, first.html);
        assert_eq!(pipeline.fetcher().get_requests().len(), 1);
    }

    #[test]
    fn commented_and_pictured_images_untouched() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&["https://x.test/a.jpg"]);
        let content = concat!(
            r#"<!-- <img src="https://x.test/a.jpg"> -->"#,
            r#"<picture><source srcset="/hand.webp"><img src="https://x.test/a.jpg"></picture>"#,
        );

        let outcome = transform_document(&pipeline, &global_options_for(tmp.path()), content, page());
        assert_eq!(outcome.rewritten, 0);
        assert_eq!(outcome.html, content);
        assert!(pipeline.fetcher().get_requests().is_empty());
    }

    #[test]
    fn configured_attribute_is_used() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&["https://x.test/real.jpg"]);
        let mut global = global_options_for(tmp.path());
        global.transform.attribute = "data-src".into();
        let content = r#"<img src="/spinner.gif" data-src="https://x.test/real.jpg" alt="R">"#;

        let outcome = transform_document(&pipeline, &global, content, page());
        assert_eq!(outcome.rewritten, 1);
        assert!(!outcome.html.contains("spinner"));
        assert!(!outcome.html.contains("data-src"));
    }

    #[test]
    fn document_without_images_unchanged() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&[]);
        let content = "<p>No pictures here.</p>";
        let outcome = transform_document(&pipeline, &global_options_for(tmp.path()), content, page());
        assert_eq!(outcome.into_result().unwrap(), content);
    }

    #[test]
    fn transform_file_rewrites_in_place() {
        let tmp = TempDir::new().unwrap();
        let pipeline = pipeline_with(&["https://x.test/a.jpg"]);
        let path = tmp.path().join("index.html");
        std::fs::write(&path, r#"<img src="https://x.test/a.jpg">"#).unwrap();

        let outcome = transform_file(&pipeline, &global_options_for(tmp.path()), &path).unwrap();
        assert_eq!(outcome.rewritten, 1);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("<picture>"));
    }

    #[test]
    fn document_event_reports_counts() {
        let tmp = TempDir::new().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let pipeline = pipeline_with(&["https://x.test/a.jpg"]).with_events(tx);
        let content = r#"<img src="https://x.test/a.jpg"><img src="https://x.test/b.jpg">"#;

        transform_document(&pipeline, &global_options_for(tmp.path()), content, page());
        drop(pipeline);
        let last = rx.into_iter().last().unwrap();
        assert_eq!(
            last,
            ProcessEvent::DocumentFinished {
                path: page().to_path_buf(),
                rewritten: 1,
                failed: 1,
            }
        );
    }
}
