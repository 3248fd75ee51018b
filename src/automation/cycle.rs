//! Repeating cycle cursor.
//!
//! Only the first runnable cycle rule is ever followed. The cursor starts
//! at step 0 the first time it runs, then advances modulo the step count
//! each time the current step's end time passes. While a gate stroke is in
//! progress the cursor waits.

use super::rules::ControlConfig;
use crate::gate::GateDirection;

/// One step transition to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleAction {
    /// `true` for the first step after (re)start.
    pub started: bool,
    pub step: usize,
    pub direction: GateDirection,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleRuntime {
    active_rule: Option<usize>,
    step_index: usize,
    /// `None` until the first step has been issued.
    step_end_ms: Option<u32>,
}

impl CycleRuntime {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn active_rule(&self) -> Option<usize> {
        self.active_rule
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Advance the cursor; returns the step to issue, if any.
    pub fn advance(&mut self, config: &ControlConfig, now_ms: u32, action_active: bool) -> Option<CycleAction> {
        let Some((rule_idx, rule)) = config.active_cycle() else {
            self.reset();
            return None;
        };
        if self.active_rule != Some(rule_idx) {
            self.reset();
            self.active_rule = Some(rule_idx);
        }
        if action_active {
            return None;
        }

        let started = match self.step_end_ms {
            None => {
                self.step_index = 0;
                true
            }
            Some(end) if (now_ms.wrapping_sub(end) as i32) < 0 => return None,
            Some(_) => {
                self.step_index = (self.step_index + 1) % rule.steps.len();
                false
            }
        };

        let step = rule.steps[self.step_index];
        self.step_end_ms = Some(now_ms.wrapping_add(step.duration_ms));
        Some(CycleAction {
            started,
            step: self.step_index,
            direction: if step.open { GateDirection::Open } else { GateDirection::Close },
            duration_ms: step.duration_ms,
        })
    }
}
