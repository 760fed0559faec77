//! CLI output formatting.
//!
//! Progress is reported through [`ProcessEvent`]s sent by the pipeline. This
//! module turns each event into display lines; printing happens in `main` on
//! a dedicated thread. Keeping formatting pure makes it unit testable.
//!
//! # Output Format
//!
//! ```text
//! https://cdn.example.com/cat.jpg (8 derivatives)
//!     1800px webp → _site/images/3f1c0a9d22be-1800.webp
//!     1800px png: encode failed (png encode failed: ...)
//! /photos/missing.jpg failed at fetch
//!     Source /photos/missing.jpg not found at ./src/photos/missing.jpg
//! _site/index.html: 3 rewritten, 1 failed
//! ```
//!
//! Derivative lines arrive as rayon workers finish, so lines of concurrently
//! processed images may interleave.

use crate::process::ProcessEvent;
use crate::transform::TransformError;
use std::path::Path;

/// Indentation for context lines.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::ImageStarted {
            source,
            derivatives,
        } => vec![format!("{} ({} derivatives)", source, derivatives)],
        ProcessEvent::DerivativeWritten { size, format, path } => {
            vec![format!(
                "{}{}px {} \u{2192} {}",
                indent(1),
                size,
                format,
                path.display()
            )]
        }
        ProcessEvent::DerivativeFailed {
            size,
            format,
            stage,
            reason,
        } => vec![format!(
            "{}{}px {}: {} failed ({})",
            indent(1),
            size,
            format,
            stage,
            reason
        )],
        ProcessEvent::ImageFailed {
            source,
            stage,
            reason,
        } => vec![
            format!("{} failed at {}", source, stage),
            format!("{}{}", indent(1), reason),
        ],
        ProcessEvent::DocumentFinished {
            path,
            rewritten,
            failed,
        } => vec![document_line(path, *rewritten, *failed)],
    }
}

fn document_line(path: &Path, rewritten: usize, failed: usize) -> String {
    if failed == 0 {
        format!("{}: {} rewritten", path.display(), rewritten)
    } else {
        format!(
            "{}: {} rewritten, {} failed",
            path.display(),
            rewritten,
            failed
        )
    }
}

/// Summary printed after a `transform` run.
pub fn format_transform_summary(documents: usize, rewritten: usize, failed: usize) -> String {
    let mut line = format!(
        "==> {} images rewritten in {} documents",
        rewritten, documents
    );
    if failed > 0 {
        line.push_str(&format!(", {} failed", failed));
    }
    line
}

/// One line per failed image: reference, stage and reason.
pub fn format_transform_error(error: &TransformError) -> Vec<String> {
    match error {
        TransformError::Io(e) => vec![format!("IO error: {}", e)],
        TransformError::Images { path, failures } => {
            let mut lines = vec![format!("{}:", path.display())];
            for failure in failures {
                lines.push(format!(
                    "{}[{}] {}",
                    indent(1),
                    failure.stage(),
                    failure
                ));
            }
            lines
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::imaging::OutputFormat;
    use crate::pipeline::ImageError;
    use crate::types::Stage;
    use std::path::PathBuf;

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(1), "    ");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn format_image_started() {
        let event = ProcessEvent::ImageStarted {
            source: "/photos/cat.jpg".to_string(),
            derivatives: 8,
        };
        assert_eq!(
            format_process_event(&event),
            vec!["/photos/cat.jpg (8 derivatives)"]
        );
    }

    #[test]
    fn format_derivative_written() {
        let event = ProcessEvent::DerivativeWritten {
            size: 1800,
            format: OutputFormat::Webp,
            path: PathBuf::from("_site/images/abc-1800.webp"),
        };
        assert_eq!(
            format_process_event(&event),
            vec!["    1800px webp \u{2192} _site/images/abc-1800.webp"]
        );
    }

    #[test]
    fn format_derivative_failed() {
        let event = ProcessEvent::DerivativeFailed {
            size: 600,
            format: OutputFormat::Avif,
            stage: Stage::Encode,
            reason: "boom".to_string(),
        };
        assert_eq!(
            format_process_event(&event),
            vec!["    600px avif: encode failed (boom)"]
        );
    }

    #[test]
    fn format_image_failed() {
        let event = ProcessEvent::ImageFailed {
            source: "https://x.test/a.jpg".to_string(),
            stage: Stage::Fetch,
            reason: "HTTP status 404".to_string(),
        };
        let lines = format_process_event(&event);
        assert_eq!(lines[0], "https://x.test/a.jpg failed at fetch");
        assert_eq!(lines[1], "    HTTP status 404");
    }

    #[test]
    fn format_document_finished() {
        let clean = ProcessEvent::DocumentFinished {
            path: PathBuf::from("_site/index.html"),
            rewritten: 3,
            failed: 0,
        };
        assert_eq!(
            format_process_event(&clean),
            vec!["_site/index.html: 3 rewritten"]
        );
        let dirty = ProcessEvent::DocumentFinished {
            path: PathBuf::from("_site/index.html"),
            rewritten: 3,
            failed: 1,
        };
        assert_eq!(
            format_process_event(&dirty),
            vec!["_site/index.html: 3 rewritten, 1 failed"]
        );
    }

    #[test]
    fn transform_summary() {
        assert_eq!(
            format_transform_summary(2, 5, 0),
            "==> 5 images rewritten in 2 documents"
        );
        assert_eq!(
            format_transform_summary(2, 5, 1),
            "==> 5 images rewritten in 2 documents, 1 failed"
        );
    }

    #[test]
    fn transform_error_lists_each_failure() {
        let error = TransformError::Images {
            path: PathBuf::from("_site/a.html"),
            failures: vec![ImageError::Configuration {
                reference: "/a.jpg".to_string(),
                error: ConfigError::UnknownPreset("hero".to_string()),
            }],
        };
        let lines = format_transform_error(&error);
        assert_eq!(lines[0], "_site/a.html:");
        assert_eq!(lines[1], "    [resolve] /a.jpg: Unknown preset \"hero\"");
    }
}
