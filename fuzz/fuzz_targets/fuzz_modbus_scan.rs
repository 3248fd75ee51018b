//! Fuzz target: `modbus::scan`
//!
//! The first byte picks the sensor id, the rest is raw line data. Any frame
//! the scanner accepts must be a genuine response with a matching CRC.
//!
//! cargo fuzz run fuzz_modbus_scan

#![no_main]

use libfuzzer_sys::fuzz_target;
use pondgate::sensors::modbus::{crc16, scan, Scan};

fuzz_target!(|data: &[u8]| {
    let Some((&id, buf)) = data.split_first() else {
        return;
    };
    if let Scan::Frame(reading) = scan(id, buf) {
        let found = buf.windows(13).any(|f| {
            f[0] == id
                && f[1] == 0x03
                && f[2] == 0x08
                && crc16(&f[..11]) == u16::from_le_bytes([f[11], f[12]])
                && u16::from_be_bytes([f[3], f[4]]) == reading.level_mm
        });
        assert!(found, "scanner accepted a frame that is not in the buffer");
    }
});
