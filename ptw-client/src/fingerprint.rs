//! Content fingerprinting used as the deduplication key.

use ptw_core::Fingerprint;

/// Why a fingerprint could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum FingerprintError {
    /// Hashing is not available; the artifact is submitted without a key.
    #[error("fingerprinting unavailable: {0}")]
    HashUnavailable(String),
}

/// Computes the deduplication key of an artifact's raw bytes.
///
/// Called on a blocking thread; implementations may be CPU-heavy.
pub trait Fingerprinter: Send + Sync {
    /// Fingerprint `content`.
    ///
    /// # Errors
    /// Returns [`FingerprintError::HashUnavailable`] if no digest can be
    /// computed.
    fn fingerprint(&self, content: &[u8]) -> Result<Fingerprint, FingerprintError>;
}

/// SHA-256 over the full content.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Fingerprinter;

impl Fingerprinter for Sha256Fingerprinter {
    fn fingerprint(&self, content: &[u8]) -> Result<Fingerprint, FingerprintError> {
        Ok(Fingerprint::of(content))
    }
}

/// Never produces a fingerprint, forcing every selection to upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl Fingerprinter for Disabled {
    fn fingerprint(&self, _content: &[u8]) -> Result<Fingerprint, FingerprintError> {
        Err(FingerprintError::HashUnavailable(
            "deduplication disabled".to_owned(),
        ))
    }
}
