//! Fuzz target: `ControlConfig::from_json`
//!
//! Uploaded rule documents are untrusted. Parsing must never panic, and
//! whatever parses must survive its own canonical form.
//!
//! cargo fuzz run fuzz_control_json

#![no_main]

use libfuzzer_sys::fuzz_target;
use pondgate::automation::rules::ControlConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = ControlConfig::from_json(text) else {
        return;
    };
    let canonical = config.to_json().expect("serialize parsed config");
    assert!(ControlConfig::from_json(&canonical).is_ok(), "canonical form does not parse");
});
