use std::error::Error as StdError;

/// Errors produced by the `ptw-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A fingerprint string was not 64 hexadecimal characters.
    #[error("invalid fingerprint '{input}': {reason}")]
    InvalidFingerprint { input: String, reason: String },
}

/// Flatten an error and its source chain into one line.
///
/// HTTP client errors are often terse at the top ("client error (Connect)");
/// the useful part ("Connection refused") lives further down the chain.
#[must_use]
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
