//! Pond level sensors and the aggregating [`SensorHub`].
//!
//! The hub polls one sensor per poll interval, alternating inner and
//! outer, through the [`SensorPort`]. A failed read leaves the previous
//! sample untouched; staleness only shows up once `last_ok_ms` ages out.

pub mod modbus;

use log::debug;

use crate::app::ports::{LevelReading, SensorPort};
use crate::config::GateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pond {
    Inner,
    Outer,
}

impl Pond {
    pub const fn index(self) -> usize {
        match self {
            Self::Inner => 0,
            Self::Outer => 1,
        }
    }

    const fn other(self) -> Self {
        match self {
            Self::Inner => Self::Outer,
            Self::Outer => Self::Inner,
        }
    }
}

/// Latest accepted reading for one pond.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSample {
    pub level_mm: u16,
    pub temp_x10: i16,
    pub has_value: bool,
    pub has_temp: bool,
    pub last_ok_ms: Option<u32>,
    pub prev_level_mm: u16,
    /// `None` until a first sample exists to compare against.
    pub prev_level_ms: Option<u32>,
    pub online: bool,
}

/// Warnings raised by one accepted sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub level_jump: bool,
    pub out_of_range: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub pond: Pond,
    /// `None` when every read attempt failed.
    pub accepted: Option<SampleFlags>,
}

pub struct SensorHub {
    ids: [u8; 2],
    poll_interval_ms: u32,
    online_grace_ms: u32,
    data_timeout_ms: u32,
    jump_threshold_mm_per_s: u32,
    level_min_mm: u16,
    level_max_mm: u16,

    samples: [SensorSample; 2],
    next: Pond,
    last_poll_ms: Option<u32>,
}

impl SensorHub {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            ids: [config.inner_sensor_id, config.outer_sensor_id],
            poll_interval_ms: config.sensor_poll_interval_ms,
            online_grace_ms: config.sensor_online_grace_ms,
            data_timeout_ms: config.sensor_data_timeout_ms,
            jump_threshold_mm_per_s: config.level_jump_threshold_mm_per_s,
            level_min_mm: config.level_min_mm,
            level_max_mm: config.level_max_mm,
            samples: [SensorSample::default(); 2],
            next: Pond::Inner,
            last_poll_ms: None,
        }
    }

    /// Poll the next sensor if the poll interval has elapsed.
    pub fn poll(&mut self, now_ms: u32, port: &mut impl SensorPort) -> Option<PollOutcome> {
        if self
            .last_poll_ms
            .is_some_and(|last| now_ms.wrapping_sub(last) < self.poll_interval_ms)
        {
            return None;
        }
        self.last_poll_ms = Some(now_ms);

        let pond = self.next;
        self.next = pond.other();

        let accepted = port
            .read_level(self.ids[pond.index()])
            .map(|reading| self.accept(pond, reading, now_ms));
        if accepted.is_none() {
            debug!("sensors: {:?} read failed", pond);
        }
        self.refresh_online(now_ms);
        Some(PollOutcome { pond, accepted })
    }

    /// Store a successful reading and evaluate jump and range against the
    /// previous accepted sample.
    pub fn accept(&mut self, pond: Pond, reading: LevelReading, now_ms: u32) -> SampleFlags {
        let jump_threshold = self.jump_threshold_mm_per_s;
        let (min, max) = (self.level_min_mm, self.level_max_mm);
        let s = &mut self.samples[pond.index()];

        let mut flags = SampleFlags::default();
        if let Some(prev_ms) = s.prev_level_ms {
            let dt = now_ms.wrapping_sub(prev_ms);
            if dt > 0 {
                let delta = u64::from(reading.level_mm.abs_diff(s.prev_level_mm));
                let rate = delta * 1000 / u64::from(dt);
                flags.level_jump = rate > u64::from(jump_threshold);
            }
        }
        flags.out_of_range = reading.level_mm < min || reading.level_mm > max;

        s.level_mm = reading.level_mm;
        s.temp_x10 = reading.temp_x10;
        s.has_value = true;
        s.has_temp = true;
        s.last_ok_ms = Some(now_ms);
        s.prev_level_mm = reading.level_mm;
        s.prev_level_ms = Some(now_ms);
        flags
    }

    /// Online means a good sample within the grace period.
    pub fn refresh_online(&mut self, now_ms: u32) {
        let grace = self.online_grace_ms;
        for s in &mut self.samples {
            s.online = s.last_ok_ms.is_some_and(|ok| now_ms.wrapping_sub(ok) <= grace);
        }
    }

    pub fn sample(&self, pond: Pond) -> &SensorSample {
        &self.samples[pond.index()]
    }

    /// No good sample yet, or the last one is older than the data timeout.
    pub fn is_stale(&self, pond: Pond, now_ms: u32) -> bool {
        self.samples[pond.index()]
            .last_ok_ms
            .is_none_or(|ok| now_ms.wrapping_sub(ok) > self.data_timeout_ms)
    }

    pub fn any_stale(&self, now_ms: u32) -> bool {
        self.is_stale(Pond::Inner, now_ms) || self.is_stale(Pond::Outer, now_ms)
    }

    /// Current (inner, outer) levels, `None` for a pond with no sample.
    pub fn levels(&self) -> (Option<u16>, Option<u16>) {
        let level = |s: &SensorSample| s.has_value.then_some(s.level_mm);
        (level(&self.samples[0]), level(&self.samples[1]))
    }
}
