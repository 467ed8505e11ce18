//! Fuzz target: request path decoding for static assets.
//!
//! Decoding must never panic, and an accepted path must be relative and free
//! of NUL bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ptw_gateway::static_files::decode_request_path;

fuzz_target!(|raw: &str| {
    if let Ok(path) = decode_request_path(raw) {
        assert!(!path.has_root(), "decoded path must be relative: {path:?}");
        assert!(!path.to_string_lossy().contains('\0'));
    }
});
