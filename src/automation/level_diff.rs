//! Level-difference hysteresis.

use super::rules::ControlConfig;
use crate::gate::GateDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelDiffAction {
    pub rule: usize,
    pub direction: GateDirection,
    pub delta_mm: i32,
    pub threshold_mm: i32,
}

/// Decide on `delta = inner - outer` using the first enabled rule.
///
/// Opens at or below the open threshold when the gate is not already open;
/// closes at or above the close threshold when it is open. Inside the band,
/// or with a stroke in progress, nothing happens.
pub fn evaluate(
    config: &ControlConfig,
    inner_mm: Option<u16>,
    outer_mm: Option<u16>,
    action_active: bool,
    position_open: bool,
) -> Option<LevelDiffAction> {
    let (inner, outer) = (inner_mm?, outer_mm?);
    let (rule, r) = config.active_level_diff()?;
    if action_active {
        return None;
    }

    let delta_mm = i32::from(inner) - i32::from(outer);
    if delta_mm <= r.open_threshold_mm {
        return (!position_open).then_some(LevelDiffAction {
            rule,
            direction: GateDirection::Open,
            delta_mm,
            threshold_mm: r.open_threshold_mm,
        });
    }
    if delta_mm >= r.close_threshold_mm && position_open {
        return Some(LevelDiffAction {
            rule,
            direction: GateDirection::Close,
            delta_mm,
            threshold_mm: r.close_threshold_mm,
        });
    }
    None
}
