//! Automation rule tables and their JSON document.
//!
//! The document is lenient on input (missing keys take defaults, legacy
//! `"HH:MM"` and minute-based durations are accepted, surplus rules are
//! dropped) and canonical on output (`*_ms` fields only).
//!
//! ```json
//! {
//!   "tz_offset_ms": 28800000,
//!   "mode": "mixed",
//!   "daily":     [{ "en": true, "dow_mask": 127, "open_ms": 28800000, "close_ms": 32400000 }],
//!   "cycle":     [{ "en": false, "steps": [{ "state": "open", "dur_ms": 28800000 }] }],
//!   "leveldiff": [{ "en": true, "open_mm": -1, "close_mm": 0 }]
//! }
//! ```

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

pub const MAX_DAILY_RULES: usize = 8;
pub const MAX_CYCLE_RULES: usize = 5;
pub const MAX_CYCLE_STEPS: usize = 10;
pub const MAX_LEVEL_DIFF_RULES: usize = 4;

/// Monday..Sunday, bit0 = Monday.
pub const ALL_DAYS: u8 = 0x7F;

const HOUR_MS: u32 = 3_600_000;
const DEFAULT_TZ_OFFSET_MS: i32 = 8 * HOUR_MS as i32;
const DEFAULT_OPEN_MS: u32 = 8 * HOUR_MS;
const DEFAULT_CLOSE_MS: u32 = 9 * HOUR_MS;
const MIN_STEP_MS: u32 = 1_000;

// ── Rule types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// Cycle if one is enabled, otherwise daily triggers plus level difference.
    #[default]
    Mixed,
    Daily,
    Cycle,
    LevelDiff,
}

impl ControlMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mixed" => Some(Self::Mixed),
            "daily" => Some(Self::Daily),
            "cycle" => Some(Self::Cycle),
            "leveldiff" => Some(Self::LevelDiff),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::Daily => "daily",
            Self::Cycle => "cycle",
            Self::LevelDiff => "leveldiff",
        }
    }
}

/// Fire open and/or close at fixed local times on selected weekdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyRule {
    #[serde(rename = "en")]
    pub enabled: bool,
    pub dow_mask: u8,
    #[serde(rename = "open_en")]
    pub open_enabled: bool,
    /// Milliseconds after local midnight.
    pub open_ms: u32,
    #[serde(rename = "close_en")]
    pub close_enabled: bool,
    pub close_ms: u32,
}

impl DailyRule {
    pub const fn open_minute(&self) -> u32 {
        self.open_ms / 60_000
    }

    pub const fn close_minute(&self) -> u32 {
        self.close_ms / 60_000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStep {
    pub open: bool,
    pub duration_ms: u32,
}

impl Serialize for CycleStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("CycleStep", 2)?;
        st.serialize_field("state", if self.open { "open" } else { "close" })?;
        st.serialize_field("dur_ms", &self.duration_ms)?;
        st.end()
    }
}

/// Repeating open/close timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleRule {
    #[serde(rename = "en")]
    pub enabled: bool,
    pub steps: heapless::Vec<CycleStep, MAX_CYCLE_STEPS>,
}

impl CycleRule {
    /// Enabled and has something to run.
    pub fn is_runnable(&self) -> bool {
        self.enabled && !self.steps.is_empty()
    }
}

/// Hysteresis on `inner - outer`: open at or below `open_threshold_mm`,
/// close at or above `close_threshold_mm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelDiffRule {
    #[serde(rename = "en")]
    pub enabled: bool,
    #[serde(rename = "open_mm")]
    pub open_threshold_mm: i32,
    #[serde(rename = "close_mm")]
    pub close_threshold_mm: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlConfig {
    pub tz_offset_ms: i32,
    pub mode: ControlMode,
    pub daily: heapless::Vec<DailyRule, MAX_DAILY_RULES>,
    pub cycle: heapless::Vec<CycleRule, MAX_CYCLE_RULES>,
    #[serde(rename = "leveldiff")]
    pub level_diff: heapless::Vec<LevelDiffRule, MAX_LEVEL_DIFF_RULES>,
}

impl Default for ControlConfig {
    /// Mixed mode; daily 08:00 open / 09:00 close every day; one disabled
    /// three-step cycle; level difference open ≤ -1 mm, close ≥ 0 mm.
    fn default() -> Self {
        let mut daily = heapless::Vec::new();
        let _ = daily.push(DailyRule {
            enabled: true,
            dow_mask: ALL_DAYS,
            open_enabled: true,
            open_ms: DEFAULT_OPEN_MS,
            close_enabled: true,
            close_ms: DEFAULT_CLOSE_MS,
        });

        let mut steps = heapless::Vec::new();
        for (open, hours) in [(true, 8), (false, 3), (true, 5)] {
            let _ = steps.push(CycleStep {
                open,
                duration_ms: hours * HOUR_MS,
            });
        }
        let mut cycle = heapless::Vec::new();
        let _ = cycle.push(CycleRule { enabled: false, steps });

        let mut level_diff = heapless::Vec::new();
        let _ = level_diff.push(LevelDiffRule {
            enabled: true,
            open_threshold_mm: -1,
            close_threshold_mm: 0,
        });

        Self {
            tz_offset_ms: DEFAULT_TZ_OFFSET_MS,
            mode: ControlMode::Mixed,
            daily,
            cycle,
            level_diff,
        }
    }
}

impl ControlConfig {
    /// First enabled cycle rule with at least one step, with its index.
    pub fn active_cycle(&self) -> Option<(usize, &CycleRule)> {
        self.cycle.iter().enumerate().find(|(_, r)| r.is_runnable())
    }

    /// First enabled level-difference rule, with its index.
    pub fn active_level_diff(&self) -> Option<(usize, &LevelDiffRule)> {
        self.level_diff.iter().enumerate().find(|(_, r)| r.enabled)
    }

    /// Parse a stored or uploaded document.
    ///
    /// Fails only when the text is not JSON or the top level is not an
    /// object.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let doc: Value = serde_json::from_str(text)?;
        let root = doc
            .as_object()
            .ok_or_else(|| serde::de::Error::custom("control document must be an object"))?;
        Ok(parse_document(Fields(root)))
    }

    /// Canonical pretty-printed document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ── Lenient input schema ──────────────────────────────────────
//
// Each field is read on its own: a missing or wrongly typed value takes
// that field's default and the rest of the document is kept. Array
// elements that are not objects are skipped.

/// Field accessors over one JSON object.
#[derive(Clone, Copy)]
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn flag(self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    fn text(self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Integer, or a float truncated toward zero.
    fn int(self, key: &str) -> Option<i64> {
        let v = self.0.get(key)?;
        v.as_i64()
            .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
    }

    /// Non-negative integer saturated to `u32`.
    fn uint(self, key: &str) -> Option<u32> {
        match self.0.get(key)?.as_u64() {
            Some(n) => Some(u32::try_from(n).unwrap_or(u32::MAX)),
            None => self.int(key).filter(|n| *n >= 0).map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    /// Object elements of the array under `key`, at most `max` of them.
    fn objects(self, key: &str, max: usize) -> impl Iterator<Item = Fields<'a>> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .map(Fields)
            .take(max)
    }
}

fn parse_document(root: Fields<'_>) -> ControlConfig {
    let defaults = ControlConfig::default();

    let tz_offset_ms = match (root.int("tz_offset_ms"), root.int("tz_offset_s")) {
        (Some(ms), _) => clamp_i32(ms),
        (None, Some(s)) => clamp_i32(s.saturating_mul(1000)),
        (None, None) => defaults.tz_offset_ms,
    };

    let mode = root.text("mode").and_then(ControlMode::parse).unwrap_or(defaults.mode);

    let daily = root.objects("daily", MAX_DAILY_RULES).map(parse_daily).collect();
    let cycle = root.objects("cycle", MAX_CYCLE_RULES).map(parse_cycle).collect();
    let level_diff = root
        .objects("leveldiff", MAX_LEVEL_DIFF_RULES)
        .map(|r| LevelDiffRule {
            enabled: r.flag("en").unwrap_or(false),
            open_threshold_mm: r.int("open_mm").map_or(-1, clamp_i32),
            close_threshold_mm: r.int("close_mm").map_or(0, clamp_i32),
        })
        .collect();

    ControlConfig {
        tz_offset_ms,
        mode,
        daily,
        cycle,
        level_diff,
    }
}

fn parse_daily(r: Fields<'_>) -> DailyRule {
    let open_ms = r
        .uint("open_ms")
        .or_else(|| r.text("open").and_then(parse_hhmm))
        .unwrap_or(DEFAULT_OPEN_MS);
    let close_ms = r
        .uint("close_ms")
        .or_else(|| r.text("close").and_then(parse_hhmm))
        .unwrap_or(DEFAULT_CLOSE_MS);
    DailyRule {
        enabled: r.flag("en").unwrap_or(false),
        dow_mask: (r.uint("dow_mask").unwrap_or(u32::from(ALL_DAYS)) & u32::from(ALL_DAYS)) as u8,
        open_enabled: r.flag("open_en").unwrap_or(true),
        open_ms,
        close_enabled: r.flag("close_en").unwrap_or(true),
        close_ms,
    }
}

fn parse_cycle(r: Fields<'_>) -> CycleRule {
    let steps = r
        .objects("steps", MAX_CYCLE_STEPS)
        .map(|st| {
            let duration_ms = st
                .uint("dur_ms")
                .or_else(|| st.uint("min").map(|m| m.saturating_mul(60_000)))
                .or_else(|| st.uint("ms"))
                .unwrap_or(0);
            CycleStep {
                open: st.text("state") != Some("close"),
                duration_ms: if duration_ms == 0 { MIN_STEP_MS } else { duration_ms },
            }
        })
        .collect();
    CycleRule {
        enabled: r.flag("en").unwrap_or(false),
        steps,
    }
}

/// `"HH:MM"` → milliseconds after midnight.
fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some((h * 3_600 + m * 60) * 1_000)
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
