//! Manual takeover window and automation latch.
//!
//! Two independent switches decide whether automation may drive the gate:
//!
//! - a **takeover window**: a bounded pause started whenever a person
//!   commands the gate, expiring on its own;
//! - the **auto latch**: a sticky "automation off" that only an explicit
//!   enable clears.
//!
//! Automation runs only when it is enabled, not latched, and no window is
//! open.

use log::{debug, info};

use crate::config::GateConfig;

pub struct ManualOverride {
    active: bool,
    until_ms: u32,
    duration_ms: u32,
    auto_enabled: bool,
    auto_latched: bool,
    /// Window length used by [`pause_by_manual_takeover`](Self::pause_by_manual_takeover).
    recover_ms: u32,
}

impl ManualOverride {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            active: false,
            until_ms: 0,
            duration_ms: 0,
            auto_enabled: config.auto_control_enabled,
            auto_latched: false,
            recover_ms: config.manual_recover_ms(),
        }
    }

    /// Open a takeover window of `duration_ms`. A zero duration is ignored.
    pub fn set_takeover(&mut self, now_ms: u32, duration_ms: u32) {
        if duration_ms == 0 {
            return;
        }
        self.active = true;
        self.duration_ms = duration_ms;
        self.until_ms = now_ms.wrapping_add(duration_ms);
        debug!("takeover: window open for {} ms", duration_ms);
    }

    pub fn end_takeover(&mut self) {
        self.active = false;
        self.until_ms = 0;
        self.duration_ms = 0;
    }

    /// Full resume: clear the latch, enable automation, close any window.
    pub fn enable_auto(&mut self) {
        self.auto_latched = false;
        self.auto_enabled = true;
        self.end_takeover();
        info!("takeover: automation enabled");
    }

    /// Disable automation until [`enable_auto`](Self::enable_auto).
    pub fn latch_auto_off(&mut self) {
        self.auto_latched = true;
        self.auto_enabled = false;
        self.end_takeover();
        info!("takeover: automation latched off");
    }

    /// Invoked for every manual stop/open/close: automation stays enabled
    /// but pauses for the fixed recovery window.
    pub fn pause_by_manual_takeover(&mut self, now_ms: u32) {
        self.auto_latched = false;
        self.auto_enabled = true;
        self.set_takeover(now_ms, self.recover_ms);
    }

    /// Expire the window once `now >= until`. Returns `true` on expiry.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        if !self.active {
            return false;
        }
        if (now_ms.wrapping_sub(self.until_ms) as i32) >= 0 {
            self.end_takeover();
            debug!("takeover: window expired");
            return true;
        }
        false
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto_enabled
    }

    pub fn auto_latched(&self) -> bool {
        self.auto_latched
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn automation_allowed(&self) -> bool {
        self.auto_enabled && !self.auto_latched && !self.active
    }

    /// Seconds left in the window, rounded up. Zero when inactive.
    pub fn remaining_secs(&self, now_ms: u32) -> u32 {
        if !self.active {
            return 0;
        }
        let left = self.until_ms.wrapping_sub(now_ms) as i32;
        if left <= 0 {
            return 0;
        }
        (left as u32).div_ceil(1000)
    }
}
