//! Interlocked two-relay gate actuator.
//!
//! The gate motor is driven by two relays: CH1 runs it in the open
//! direction, CH2 in the close direction. Energising both at once shorts
//! the motor supply, so every path that changes them goes through
//! [`GateActuator`].
//!
//! ```text
//!             open() ok                 close() ok
//!   Stopped ───────────▶ Opening   Stopped ───────────▶ Closing
//!      ▲                    │         ▲                    │
//!      └──── stop() / duration / runaway watchdog ─────────┘
//! ```
//!
//! The gate has no position feedback. A stroke that runs for the full
//! action duration latches `position_open`; a stroke cut short by
//! `stop()` leaves the previous position in place.

use log::{debug, error, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, RelayChannel, RelayPort};
use crate::config::GateConfig;

// ── Types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Stopped,
    Opening,
    Closing,
}

impl GateState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Opening => "opening",
            Self::Closing => "closing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDirection {
    Open,
    Close,
}

impl GateDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
        }
    }

    const fn drive_relay(self) -> RelayChannel {
        match self {
            Self::Open => RelayChannel::GATE_OPEN,
            Self::Close => RelayChannel::GATE_CLOSE,
        }
    }

    const fn opposing_relay(self) -> RelayChannel {
        match self {
            Self::Open => RelayChannel::GATE_CLOSE,
            Self::Close => RelayChannel::GATE_OPEN,
        }
    }

    const fn running_state(self) -> GateState {
        match self {
            Self::Open => GateState::Opening,
            Self::Close => GateState::Closing,
        }
    }
}

/// Commanded relay flags for the gate pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayPair {
    /// CH1
    pub open: bool,
    /// CH2
    pub close: bool,
}

impl RelayPair {
    pub const fn both(self) -> bool {
        self.open && self.close
    }

    const fn get(self, channel: RelayChannel) -> bool {
        match channel {
            RelayChannel::Ch1 => self.open,
            RelayChannel::Ch2 => self.close,
            _ => false,
        }
    }
}

/// Why a gate command was refused, or why commands are currently blocked.
///
/// Rendered to its fixed operator-facing text only at the telemetry and
/// log boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Open requested while CH2 is energised.
    CloseRelayActive,
    /// Close requested while CH1 is energised.
    OpenRelayActive,
    AlreadyOpening,
    AlreadyClosing,
    /// Automated request inside the cooldown window.
    Cooldown,
    /// Availability: both relays energised.
    BothRelaysActive,
    /// Availability: a stroke is in progress.
    GateRunning,
    /// Availability: cooldown window still open.
    CooldownInterval,
}

impl BlockReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CloseRelayActive => "Interlock: close relay is active",
            Self::OpenRelayActive => "Interlock: open relay is active",
            Self::AlreadyOpening => "Gate is already opening",
            Self::AlreadyClosing => "Gate is already closing",
            Self::Cooldown => "Cooldown active: wait before next action",
            Self::BothRelaysActive => "Interlock: both relays cannot be active",
            Self::GateRunning => "Gate is running, repeat action blocked",
            Self::CooldownInterval => "Cooldown active: min action interval",
        }
    }
}

impl core::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the UI / telemetry may offer right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub open_allowed: bool,
    pub close_allowed: bool,
    pub reason: Option<BlockReason>,
}

impl Availability {
    const ALLOWED: Self = Self {
        open_allowed: true,
        close_allowed: true,
        reason: None,
    };

    const fn blocked(reason: BlockReason) -> Self {
        Self {
            open_allowed: false,
            close_allowed: false,
            reason: Some(reason),
        }
    }
}

// ── Actuator ──────────────────────────────────────────────────

/// Sole owner of the gate relays.
///
/// Every mutating call takes `manual`: whether a manual takeover window is
/// active. Manual control bypasses the cooldown and resolves a reversing
/// request by stopping first instead of refusing it.
pub struct GateActuator {
    action_duration_ms: u32,
    min_interval_ms: u32,
    max_run_ms: u32,
    block_log_interval_ms: u32,

    state: GateState,
    relays: RelayPair,
    position_open: bool,
    /// `Some` while a stroke is in progress.
    action_started_ms: Option<u32>,
    /// `None` until the first stop or boot hold-off.
    last_action_end_ms: Option<u32>,

    interlock_fault: bool,
    timeout_fault: bool,

    availability: Availability,
    last_rejection: Option<BlockReason>,
    /// Last time a refusal was reported to the sink.
    last_block_log_ms: Option<u32>,
}

impl GateActuator {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            action_duration_ms: config.action_duration_ms(),
            min_interval_ms: config.min_action_interval_ms(),
            max_run_ms: config.max_continuous_run_ms(),
            block_log_interval_ms: config.block_log_interval_ms,
            state: GateState::Stopped,
            relays: RelayPair::default(),
            position_open: false,
            action_started_ms: None,
            last_action_end_ms: None,
            interlock_fault: false,
            timeout_fault: false,
            availability: Availability::ALLOWED,
            last_rejection: None,
            last_block_log_ms: None,
        }
    }

    // ── Commands ──────────────────────────────────────────────

    pub fn open(
        &mut self,
        now_ms: u32,
        manual: bool,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<(), BlockReason> {
        self.start(GateDirection::Open, now_ms, manual, hw, sink)
    }

    pub fn close(
        &mut self,
        now_ms: u32,
        manual: bool,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<(), BlockReason> {
        self.start(GateDirection::Close, now_ms, manual, hw, sink)
    }

    /// Start a stroke in `direction`. On refusal no relay changes.
    pub fn start(
        &mut self,
        direction: GateDirection,
        now_ms: u32,
        manual: bool,
        hw: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> Result<(), BlockReason> {
        let opposing = direction.opposing_relay();
        if self.relays.get(opposing) {
            if manual {
                self.stop(now_ms, manual, hw, sink);
            } else {
                let reason = match direction {
                    GateDirection::Open => BlockReason::CloseRelayActive,
                    GateDirection::Close => BlockReason::OpenRelayActive,
                };
                return Err(self.reject(direction, reason, now_ms, manual, sink));
            }
        }

        if self.state == direction.running_state() {
            let reason = match direction {
                GateDirection::Open => BlockReason::AlreadyOpening,
                GateDirection::Close => BlockReason::AlreadyClosing,
            };
            return Err(self.reject(direction, reason, now_ms, manual, sink));
        }

        if !manual && self.in_cooldown(now_ms) {
            return Err(self.reject(direction, BlockReason::Cooldown, now_ms, manual, sink));
        }

        // Break before make.
        hw.set_relay(opposing, false);
        hw.set_relay(direction.drive_relay(), true);
        self.relays = match direction {
            GateDirection::Open => RelayPair { open: true, close: false },
            GateDirection::Close => RelayPair { open: false, close: true },
        };
        self.state = direction.running_state();
        self.action_started_ms = Some(now_ms);
        self.timeout_fault = false;
        self.interlock_fault = false;
        self.refresh_availability(now_ms, manual);
        sink.emit(&AppEvent::GateStarted(direction));
        Ok(())
    }

    /// Open a cooldown window at `now_ms` without touching the relays, so
    /// automation waits one interval after boot.
    pub fn hold_off(&mut self, now_ms: u32) {
        self.last_action_end_ms = Some(now_ms);
        self.refresh_availability(now_ms, false);
    }

    /// Drive both relays off and start the cooldown window. Always succeeds,
    /// including when already stopped.
    pub fn stop(&mut self, now_ms: u32, manual: bool, hw: &mut impl RelayPort, sink: &mut impl EventSink) {
        hw.set_relay(RelayChannel::GATE_OPEN, false);
        hw.set_relay(RelayChannel::GATE_CLOSE, false);
        self.relays = RelayPair::default();
        self.state = GateState::Stopped;
        self.action_started_ms = None;
        self.last_action_end_ms = Some(now_ms);
        self.refresh_availability(now_ms, manual);
        sink.emit(&AppEvent::GateStopped);
    }

    /// Per-loop stroke supervision: runaway watchdog first, then normal
    /// completion at the fixed action duration.
    pub fn tick(&mut self, now_ms: u32, manual: bool, hw: &mut impl RelayPort, sink: &mut impl EventSink) {
        let Some(started) = self.action_started_ms else {
            return;
        };
        let elapsed = now_ms.wrapping_sub(started);

        if elapsed > self.max_run_ms {
            error!("gate: runaway after {} ms in {:?}, forcing stop", elapsed, self.state);
            self.timeout_fault = true;
            self.stop(now_ms, manual, hw, sink);
            return;
        }

        if elapsed < self.action_duration_ms {
            return;
        }

        match self.state {
            GateState::Opening => self.position_open = true,
            GateState::Closing => self.position_open = false,
            GateState::Stopped => {}
        }
        debug!("gate: stroke complete, position_open={}", self.position_open);
        self.stop(now_ms, manual, hw, sink);
    }

    /// Raise the relay-interlock fault and force both relays off. Called by
    /// the root loop when its electrical self-check sees CH1 and CH2 high.
    pub fn trip_interlock(&mut self, now_ms: u32, manual: bool, hw: &mut impl RelayPort, sink: &mut impl EventSink) {
        if !self.interlock_fault {
            warn!("gate: both relays energised, interlock tripped");
        }
        self.interlock_fault = true;
        self.stop(now_ms, manual, hw, sink);
    }

    /// Park the gate relays for the "all auxiliary on" command. Stops a
    /// running stroke first, then drives CH1/CH2 low regardless.
    pub fn park_relays(&mut self, now_ms: u32, manual: bool, hw: &mut impl RelayPort, sink: &mut impl EventSink) {
        if self.action_started_ms.is_some() || self.relays.open || self.relays.close {
            self.stop(now_ms, manual, hw, sink);
        }
        hw.set_relay(RelayChannel::GATE_OPEN, false);
        hw.set_relay(RelayChannel::GATE_CLOSE, false);
        self.relays = RelayPair::default();
        self.state = GateState::Stopped;
        self.refresh_availability(now_ms, manual);
    }

    /// Recompute what may be offered to operators.
    pub fn refresh_availability(&mut self, now_ms: u32, manual: bool) {
        self.availability = if self.relays.both() {
            Availability::blocked(BlockReason::BothRelaysActive)
        } else if manual {
            Availability::ALLOWED
        } else if self.action_started_ms.is_some() {
            Availability::blocked(BlockReason::GateRunning)
        } else if self.in_cooldown(now_ms) {
            Availability::blocked(BlockReason::CooldownInterval)
        } else {
            Availability::ALLOWED
        };
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn relays(&self) -> RelayPair {
        self.relays
    }

    pub fn position_open(&self) -> bool {
        self.position_open
    }

    pub fn is_action_active(&self) -> bool {
        self.action_started_ms.is_some()
    }

    pub fn interlock_fault(&self) -> bool {
        self.interlock_fault
    }

    pub fn timeout_fault(&self) -> bool {
        self.timeout_fault
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    /// Reason the most recent refused command was refused.
    pub fn last_rejection(&self) -> Option<BlockReason> {
        self.last_rejection
    }

    pub fn last_action_end_ms(&self) -> Option<u32> {
        self.last_action_end_ms
    }

    pub fn in_cooldown(&self, now_ms: u32) -> bool {
        self.last_action_end_ms
            .is_some_and(|end| now_ms.wrapping_sub(end) < self.min_interval_ms)
    }

    // ── Internal ──────────────────────────────────────────────

    fn reject(
        &mut self,
        direction: GateDirection,
        reason: BlockReason,
        now_ms: u32,
        manual: bool,
        sink: &mut impl EventSink,
    ) -> BlockReason {
        self.last_rejection = Some(reason);
        self.refresh_availability(now_ms, manual);
        // At most one report per block-log interval.
        let quiet = self
            .last_block_log_ms
            .is_some_and(|last| now_ms.wrapping_sub(last) < self.block_log_interval_ms);
        if !quiet {
            self.last_block_log_ms = Some(now_ms);
            sink.emit(&AppEvent::GateBlocked { direction, reason });
        }
        reason
    }
}
