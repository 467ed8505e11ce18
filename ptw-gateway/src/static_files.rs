//! Sandboxed resolution of static assets under the SPA build directory.
//!
//! A request path is percent-decoded, folded lexically against the root and
//! then canonicalized, so neither encoded `..` sequences nor symlinks can
//! reach a file outside the root. Every failure collapses into one of two
//! signals, [`ResolveError::Rejected`] or [`ResolveError::NotFound`]; the
//! dispatcher answers both with the entry document.

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

use crate::config::ConfigError;

/// Entry document of the single-page application.
pub const INDEX_DOCUMENT: &str = "index.html";

/// Why a request path did not resolve to a servable file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// The path is malformed or points outside the static root.
    #[error("rejected request path: {0}")]
    Rejected(&'static str),

    /// Nothing servable lives at the path (missing or a directory).
    #[error("no asset at request path")]
    NotFound,
}

/// Canonical static root directory and its entry document.
#[derive(Debug, Clone)]
pub struct StaticRoot {
    root: PathBuf,
    index: PathBuf,
}

impl StaticRoot {
    /// Canonicalize `dir` and remember it as the sandbox root.
    ///
    /// A missing entry document is only logged: the gateway still starts
    /// and answers fallback requests with a server error until it appears.
    ///
    /// # Errors
    /// Returns [`ConfigError::StaticRoot`] if `dir` does not exist or is not
    /// a directory.
    pub fn open(dir: &Path) -> Result<Self, ConfigError> {
        let root = std::fs::canonicalize(dir).map_err(|source| ConfigError::StaticRoot {
            path: dir.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Err(ConfigError::StaticRoot {
                path: dir.to_path_buf(),
                source: std::io::Error::other("not a directory"),
            });
        }
        let index = root.join(INDEX_DOCUMENT);
        if !index.is_file() {
            tracing::warn!(index = %index.display(), "entry document missing from static root");
        }
        Ok(Self { root, index })
    }

    /// The canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the SPA entry document.
    #[must_use]
    pub fn index_document(&self) -> &Path {
        &self.index
    }

    /// Resolve an HTTP request path to a file strictly inside the root.
    ///
    /// # Errors
    /// [`ResolveError::Rejected`] for undecodable paths and anything that
    /// escapes the root; [`ResolveError::NotFound`] for missing files and
    /// directories.
    pub async fn resolve(&self, request_path: &str) -> Result<PathBuf, ResolveError> {
        let relative = decode_request_path(request_path)?;
        let candidate = join_within(&self.root, &relative)?;

        let canonical = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|_| ResolveError::NotFound)?;
        if !canonical.starts_with(&self.root) {
            return Err(ResolveError::Rejected("resolves outside the static root"));
        }

        let metadata = tokio::fs::metadata(&canonical)
            .await
            .map_err(|_| ResolveError::NotFound)?;
        if metadata.is_dir() {
            return Err(ResolveError::NotFound);
        }
        Ok(canonical)
    }
}

/// Percent-decode a request path and strip its leading separators.
///
/// The result is relative and has not been checked for traversal yet.
///
/// # Errors
/// Returns [`ResolveError::Rejected`] if the decoded bytes are not UTF-8 or
/// contain a NUL byte.
pub fn decode_request_path(raw: &str) -> Result<PathBuf, ResolveError> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ResolveError::Rejected("path is not valid UTF-8 after decoding"))?;
    if decoded.contains('\0') {
        return Err(ResolveError::Rejected("path contains a NUL byte"));
    }
    Ok(PathBuf::from(decoded.trim_start_matches(['/', '\\'])))
}

/// Lexically fold `relative` onto `root`, refusing to climb above it.
fn join_within(root: &Path, relative: &Path) -> Result<PathBuf, ResolveError> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(ResolveError::Rejected("traversal above the static root"));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ResolveError::Rejected("absolute path component"));
            }
        }
    }
    let mut joined = root.to_path_buf();
    joined.extend(parts);
    Ok(joined)
}

/// Map a file extension to its `Content-Type`.
///
/// Unknown or missing extensions are served as `application/octet-stream`.
#[must_use]
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
