//! Source location: turn an image reference into raw bytes.
//!
//! References come in two kinds:
//!
//! | Reference | Kind | Read from |
//! |---|---|---|
//! | `https://cdn.example.com/cat.jpg` | remote | HTTP GET via [`HttpFetch`] |
//! | `/photos/cat%20nap.jpg?v=2` | local | `input_directory/photos/cat nap.jpg` |
//!
//! A reference is remote iff it starts with `http://` or `https://`
//! (ASCII case-insensitive). Local references drop their query string and
//! fragment, are percent-decoded, and lose their leading `/` before being
//! joined onto the input directory. A reference that would climb out of the
//! input directory (`/../secret.jpg`) is treated as not found.
//!
//! There are no retries. Any non-2xx status or transport error surfaces as
//! [`SourceError::Unavailable`].

use crate::options::ResolvedOptions;
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("ditherpic/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source {reference} not found at {}", .path.display())]
    NotFound { reference: String, path: PathBuf },
    #[error("Source {reference} unavailable: {reason}")]
    Unavailable { reference: String, reason: String },
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// How a reference is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Remote,
    Local,
}

pub fn classify(source_ref: &str) -> SourceKind {
    let is_remote = ["http://", "https://"].iter().any(|scheme| {
        source_ref
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });
    if is_remote {
        SourceKind::Remote
    } else {
        SourceKind::Local
    }
}

/// Map a local reference onto the filesystem.
pub fn local_path(source_ref: &str, options: &ResolvedOptions) -> PathBuf {
    let end = source_ref.find(['?', '#']).unwrap_or(source_ref.len());
    let decoded = percent_decode_str(&source_ref[..end]).decode_utf8_lossy();
    options
        .input_directory
        .join(decoded.trim_start_matches('/'))
}

/// Whether `path` stays inside `root` without going through `..`.
fn is_within(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root).is_ok_and(|relative| {
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    })
}

/// Response from an [`HttpFetch`] implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub bytes: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking HTTP GET.
///
/// Transport failures are returned as `Err(reason)`; HTTP error statuses are
/// returned as responses and judged by the caller.
pub trait HttpFetch: Sync {
    fn get(&self, url: &str) -> Result<HttpResponse, String>;
}

/// Production fetcher on a blocking `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpFetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<HttpResponse, String> {
        let response = self.client.get(url).send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let bytes = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(HttpResponse { status, bytes })
    }
}

/// Read the bytes behind `source_ref`.
pub fn fetch_bytes(
    source_ref: &str,
    options: &ResolvedOptions,
    fetcher: &impl HttpFetch,
) -> Result<Vec<u8>, SourceError> {
    match classify(source_ref) {
        SourceKind::Remote => {
            debug!(url = source_ref, "fetching remote source");
            let response = fetcher.get(source_ref).map_err(|reason| SourceError::Unavailable {
                reference: source_ref.to_string(),
                reason,
            })?;
            if !response.is_success() {
                return Err(SourceError::Unavailable {
                    reference: source_ref.to_string(),
                    reason: format!("HTTP status {}", response.status),
                });
            }
            Ok(response.bytes)
        }
        SourceKind::Local => {
            let path = local_path(source_ref, options);
            debug!(path = %path.display(), "reading local source");
            if !is_within(&path, &options.input_directory) || !path.is_file() {
                return Err(SourceError::NotFound {
                    reference: source_ref.to_string(),
                    path,
                });
            }
            std::fs::read(&path).map_err(|e| SourceError::Unavailable {
                reference: source_ref.to_string(),
                reason: e.to_string(),
            })
        }
    }
}
