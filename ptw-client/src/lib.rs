//! Analysis workflow client for the PTW backend.
//!
//! Computes a content fingerprint for a selected artifact, reuses an earlier
//! analysis of identical content when the backend has one, otherwise uploads
//! the artifact and polls the resulting task until it completes or fails.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod session;
pub mod timer;

pub use backend::{AnalysisBackend, Artifact};
pub use config::ControllerConfig;
pub use controller::{AnalysisController, ControllerHandle};
pub use error::ClientError;
pub use fingerprint::{FingerprintError, Fingerprinter, Sha256Fingerprinter};
pub use http::HttpBackend;
pub use session::{Phase, SessionId, SessionSnapshot};
