//! Fuzz target: JSON deserialization of backend task views.
//!
//! Arbitrary backend bodies may fail to parse but must never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ptw_core::{SubmitReceipt, TaskView};

fuzz_target!(|data: &[u8]| {
    if let Ok(view) = serde_json::from_slice::<TaskView>(data) {
        let _ = view.status.is_terminal();
        let _ = view.result.as_ref().and_then(|r| r.risk_level());
    }
    let _ = serde_json::from_slice::<SubmitReceipt>(data);
});
