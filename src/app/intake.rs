//! Command intake channel.
//!
//! Transports that run outside the control loop (BLE callbacks, MQTT and
//! HTTP tasks) hand their normalised commands over through one bounded
//! static `embassy-sync` channel. The control loop drains it once per
//! tick, before the tick body, so every command executes inside the
//! loop's single exclusion domain.
//!
//! ```text
//! ┌──────────────┐  AppCommand  ┌──────────────┐
//! │  transports  │─────────────▶│ control loop │
//! └──────────────┘              └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use super::commands::AppCommand;

/// Commands queued between two loop iterations.
pub const INTAKE_DEPTH: usize = 8;

pub static INTAKE: Channel<CriticalSectionRawMutex, AppCommand, INTAKE_DEPTH> = Channel::new();

/// Queue a command without blocking. Hands the command back when the
/// queue is full.
pub fn submit(cmd: AppCommand) -> Result<(), AppCommand> {
    INTAKE.try_send(cmd).map_err(|e| match e {
        embassy_sync::channel::TrySendError::Full(cmd) => cmd,
    })
}

/// Hand every queued command to `f`, oldest first. Returns how many ran.
pub fn drain(mut f: impl FnMut(AppCommand)) -> usize {
    let mut n = 0;
    while let Ok(cmd) = INTAKE.try_receive() {
        f(cmd);
        n += 1;
    }
    n
}
