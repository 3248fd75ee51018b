//! Modbus-RTU level sensor transport.
//!
//! Each sensor answers a function-0x03 read of four holding registers
//! starting at 0x0000:
//!
//! ```text
//! request  (8 B):  id 03 00 00 00 04 crc_lo crc_hi
//! response (13 B): id 03 08 | lvl_hi lvl_lo | r2 r2 | r3 r3 | t_hi t_lo | crc_lo crc_hi
//! ```
//!
//! Register 0 is the level in mm, register 3 the signed temperature in
//! tenths of a degree. The CRC covers the first 11 response bytes.
//!
//! The RS-485 line picks up echo and noise around direction changes, so
//! the receiver collects up to [`RX_WINDOW`] bytes and accepts a valid
//! frame at any offset.

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::app::ports::{LevelReading, MonotonicClock, SensorBus, SensorPort};
use crate::config::GateConfig;
use crate::error::SensorError;

const FN_READ_HOLDING: u8 = 0x03;
const REGISTER_COUNT: u8 = 4;
const RESPONSE_LEN: usize = 13;
const RESPONSE_CRC_SPAN: usize = 11;

/// Bytes collected per attempt before scanning stops growing.
pub const RX_WINDOW: usize = 32;

/// Line settle time between the two input drains.
const SETTLE_MS: u32 = 5;

/// CRC-16/MODBUS (init 0xFFFF, reflected poly 0xA001).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &b in data {
        crc ^= u16::from(b);
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
        }
    }
    crc
}

/// Read request for `sensor_id`.
pub fn build_request(sensor_id: u8) -> [u8; 8] {
    let mut frame = [sensor_id, FN_READ_HOLDING, 0x00, 0x00, 0x00, REGISTER_COUNT, 0, 0];
    let crc = crc16(&frame[..6]).to_le_bytes();
    frame[6] = crc[0];
    frame[7] = crc[1];
    frame
}

/// Result of scanning a receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    Frame(LevelReading),
    /// A header for this sensor was seen but its CRC did not match.
    BadCrc,
    /// Nothing usable yet.
    Incomplete,
}

/// Look for a valid response from `sensor_id` anywhere in `buf`.
pub fn scan(sensor_id: u8, buf: &[u8]) -> Scan {
    let mut saw_bad_crc = false;
    for frame in buf.windows(RESPONSE_LEN) {
        if frame[0] != sensor_id || frame[1] != FN_READ_HOLDING || frame[2] != REGISTER_COUNT * 2 {
            continue;
        }
        let expected = u16::from_le_bytes([frame[11], frame[12]]);
        if crc16(&frame[..RESPONSE_CRC_SPAN]) != expected {
            saw_bad_crc = true;
            continue;
        }
        return Scan::Frame(LevelReading {
            level_mm: u16::from_be_bytes([frame[3], frame[4]]),
            temp_x10: i16::from_be_bytes([frame[9], frame[10]]),
        });
    }
    if saw_bad_crc { Scan::BadCrc } else { Scan::Incomplete }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Request/response reader with bounded retry.
///
/// Generic over the byte bus, a monotonic clock for the receive window,
/// and an `embedded-hal` delay for settle and retry gaps, so the whole
/// exchange runs against scripted fakes on the host.
pub struct ModbusSensorReader<B, C, D> {
    bus: B,
    clock: C,
    delay: D,
    timeout_ms: u32,
    retry_gap_ms: u32,
    retry_count: u8,
}

impl<B: SensorBus, C: MonotonicClock, D: DelayNs> ModbusSensorReader<B, C, D> {
    pub fn new(bus: B, clock: C, delay: D, config: &GateConfig) -> Self {
        Self {
            bus,
            clock,
            delay,
            timeout_ms: config.modbus_timeout_ms,
            retry_gap_ms: config.modbus_retry_gap_ms,
            retry_count: config.modbus_retry_count.max(1),
        }
    }

    /// One request/response exchange.
    pub fn read_once(&mut self, sensor_id: u8) -> Result<LevelReading, SensorError> {
        self.bus.clear_input();
        self.delay.delay_ms(SETTLE_MS);
        self.bus.clear_input();

        self.bus.write_frame(&build_request(sensor_id))?;

        let mut buf = [0u8; RX_WINDOW];
        let mut len = 0;
        let mut last = Scan::Incomplete;
        let start = self.clock.now_ms();

        while len < RX_WINDOW && self.clock.now_ms().wrapping_sub(start) < self.timeout_ms {
            let n = self.bus.read_available(&mut buf[len..])?;
            if n == 0 {
                self.delay.delay_ms(1);
                continue;
            }
            len += n;
            last = scan(sensor_id, &buf[..len]);
            if let Scan::Frame(reading) = last {
                return Ok(reading);
            }
        }

        Err(match (len, last) {
            (0, _) => SensorError::NoResponse,
            (_, Scan::BadCrc) => SensorError::CrcMismatch,
            _ => SensorError::Timeout,
        })
    }

    /// Up to `retry_count` exchanges with a fixed gap between them.
    pub fn read_with_retry(&mut self, sensor_id: u8) -> Option<LevelReading> {
        for attempt in 1..=self.retry_count {
            match self.read_once(sensor_id) {
                Ok(reading) => return Some(reading),
                Err(e) => debug!("modbus: sensor {} attempt {}/{}: {}", sensor_id, attempt, self.retry_count, e),
            }
            if attempt < self.retry_count {
                self.delay.delay_ms(self.retry_gap_ms);
            }
        }
        None
    }
}

impl<B: SensorBus, C: MonotonicClock, D: DelayNs> SensorPort for ModbusSensorReader<B, C, D> {
    fn read_level(&mut self, sensor_id: u8) -> Option<LevelReading> {
        self.read_with_retry(sensor_id)
    }
}
