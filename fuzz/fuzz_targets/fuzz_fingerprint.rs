//! Fuzz target: `Fingerprint` parsing.
//!
//! Any string that parses must display as 64 lowercase hex characters and
//! parse back to the same value.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ptw_core::Fingerprint;

fuzz_target!(|input: &str| {
    let Ok(fp) = input.parse::<Fingerprint>() else {
        return;
    };
    let hex = fp.to_string();
    assert_eq!(hex.len(), 64);
    assert!(hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    assert_eq!(hex.parse::<Fingerprint>().ok(), Some(fp));
});
