//! Fuzz target: command intake
//!
//! Feeds arbitrary bytes through the single-byte relay path and the JSON
//! command path. Neither may panic.
//!
//! cargo fuzz run fuzz_command_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use pondgate::app::commands::{relay_commands, AppCommand};

fuzz_target!(|data: &[u8]| {
    assert!(relay_commands(data).count() <= data.len());

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = AppCommand::parse(text);
        let _ = AppCommand::from_json(text);
    }
});
