//! Daily schedule evaluation.
//!
//! Rules fire on an exact minute-of-day match. A per-rule, per-direction
//! day key guard makes each trigger fire at most once per local calendar
//! day, however many times the loop runs during the trigger minute.

use super::rules::{DailyRule, MAX_DAILY_RULES};
use crate::gate::GateDirection;

const SECS_PER_DAY: i64 = 86_400;

/// Earliest UTC time accepted as synchronised (2021-01-01T00:00:00Z).
pub const MIN_VALID_EPOCH: u32 = 1_609_459_200;

/// Local calendar position derived from UTC and the configured offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// Local days since the epoch.
    pub day_key: i32,
    pub minute_of_day: u32,
}

impl LocalTime {
    /// `None` while the clock is unsynchronised (local time before 2021).
    pub fn from_utc(utc_epoch_secs: u32, tz_offset_ms: i32) -> Option<Self> {
        let local = i64::from(utc_epoch_secs) + i64::from(tz_offset_ms) / 1000;
        if local < i64::from(MIN_VALID_EPOCH) {
            return None;
        }
        Some(Self {
            day_key: local.div_euclid(SECS_PER_DAY) as i32,
            minute_of_day: (local.rem_euclid(SECS_PER_DAY) / 60) as u32,
        })
    }

    /// 0 = Monday .. 6 = Sunday (1970-01-01 was a Thursday).
    pub fn weekday(&self) -> u8 {
        (self.day_key + 3).rem_euclid(7) as u8
    }

    fn weekday_bit(&self) -> u8 {
        1 << self.weekday()
    }
}

/// Last day key each rule fired in each direction.
#[derive(Debug, Clone, Default)]
pub struct DailyFireGuard {
    open: [Option<i32>; MAX_DAILY_RULES],
    close: [Option<i32>; MAX_DAILY_RULES],
}

impl DailyFireGuard {
    /// Record a fire; `false` if this rule+direction already fired today.
    fn claim(&mut self, rule: usize, direction: GateDirection, day_key: i32) -> bool {
        let slot = match direction {
            GateDirection::Open => &mut self.open[rule],
            GateDirection::Close => &mut self.close[rule],
        };
        if *slot == Some(day_key) {
            return false;
        }
        *slot = Some(day_key);
        true
    }
}

/// One trigger due this minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyFire {
    pub rule: usize,
    pub direction: GateDirection,
    pub minute_of_day: u32,
}

/// Collect triggers due at `now`, in rule order, open before close.
pub fn due_triggers(
    rules: &[DailyRule],
    now: LocalTime,
    guard: &mut DailyFireGuard,
) -> heapless::Vec<DailyFire, { 2 * MAX_DAILY_RULES }> {
    let mut fires = heapless::Vec::new();
    let today = now.weekday_bit();

    for (i, rule) in rules.iter().enumerate().take(MAX_DAILY_RULES) {
        if !rule.enabled || rule.dow_mask & today == 0 {
            continue;
        }
        let slots = [
            (GateDirection::Open, rule.open_enabled, rule.open_minute()),
            (GateDirection::Close, rule.close_enabled, rule.close_minute()),
        ];
        for (direction, enabled, minute) in slots {
            if enabled && now.minute_of_day == minute && guard.claim(i, direction, now.day_key) {
                let _ = fires.push(DailyFire {
                    rule: i,
                    direction,
                    minute_of_day: minute,
                });
            }
        }
    }
    fires
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::rules::ALL_DAYS;

    // 2024-01-01 was a Monday.
    const MON_2024_01_01_UTC: u32 = 1_704_067_200;

    fn rule(open_min: u32, close_min: u32) -> DailyRule {
        DailyRule {
            enabled: true,
            dow_mask: ALL_DAYS,
            open_enabled: true,
            open_ms: open_min * 60_000,
            close_enabled: true,
            close_ms: close_min * 60_000,
        }
    }

    #[test]
    fn unsynced_clock_has_no_local_time() {
        assert!(LocalTime::from_utc(1_000, 0).is_none());
        assert!(LocalTime::from_utc(MIN_VALID_EPOCH, 0).is_some());
    }

    #[test]
    fn validity_follows_local_time() {
        const HOURS_8: i32 = 8 * 3_600_000;
        // 2020-12-31 20:00 UTC is already 2021 at +8h.
        let t = LocalTime::from_utc(MIN_VALID_EPOCH - 4 * 3_600, HOURS_8).unwrap();
        assert_eq!(t.minute_of_day, 4 * 60);
        assert!(LocalTime::from_utc(MIN_VALID_EPOCH - 8 * 3_600 - 1, HOURS_8).is_none());
        // West of UTC the first hours of 2021 UTC are still 2020 locally.
        assert!(LocalTime::from_utc(MIN_VALID_EPOCH + 3_600, -2 * 3_600_000).is_none());
    }

    #[test]
    fn weekday_and_offset() {
        let t = LocalTime::from_utc(MON_2024_01_01_UTC, 0).unwrap();
        assert_eq!(t.weekday(), 0);
        assert_eq!(t.minute_of_day, 0);
        // 23:30 UTC Sunday is 07:30 Monday at +8h.
        let t = LocalTime::from_utc(MON_2024_01_01_UTC - 1_800, 8 * 3_600_000).unwrap();
        assert_eq!(t.weekday(), 0);
        assert_eq!(t.minute_of_day, 7 * 60 + 30);
        // Negative offsets step back a day.
        let t = LocalTime::from_utc(MON_2024_01_01_UTC + 60, -3_600_000).unwrap();
        assert_eq!(t.weekday(), 6);
    }

    #[test]
    fn fires_once_per_day() {
        let rules = [rule(8 * 60, 9 * 60)];
        let mut guard = DailyFireGuard::default();
        let at = |secs: u32| LocalTime::from_utc(MON_2024_01_01_UTC + secs, 0).unwrap();

        let first = due_triggers(&rules, at(8 * 3_600), &mut guard);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].direction, GateDirection::Open);
        // Same minute, later in the minute.
        assert!(due_triggers(&rules, at(8 * 3_600 + 30), &mut guard).is_empty());
        // Next day fires again.
        assert_eq!(due_triggers(&rules, at(86_400 + 8 * 3_600), &mut guard).len(), 1);
    }

    #[test]
    fn weekday_mask_filters() {
        let mut r = rule(0, 600);
        r.dow_mask = 1 << 1; // Tuesday only
        let mut guard = DailyFireGuard::default();
        let monday = LocalTime::from_utc(MON_2024_01_01_UTC, 0).unwrap();
        let tuesday = LocalTime::from_utc(MON_2024_01_01_UTC + 86_400, 0).unwrap();
        assert!(due_triggers(&[r], monday, &mut guard).is_empty());
        assert_eq!(due_triggers(&[r], tuesday, &mut guard).len(), 1);
    }

    #[test]
    fn disabled_direction_is_skipped() {
        let mut r = rule(60, 60);
        r.open_enabled = false;
        let mut guard = DailyFireGuard::default();
        let t = LocalTime::from_utc(MON_2024_01_01_UTC + 3_600, 0).unwrap();
        let fires = due_triggers(&[r], t, &mut guard);
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].direction, GateDirection::Close);
    }
}
