//! Inbound commands to the gate controller.
//!
//! Every transport (front-panel input, HTTP, MQTT, Bluetooth, serial)
//! normalises what it receives into [`AppCommand`]s before handing them to
//! the [`GateController`](super::service::GateController). The relay byte
//! space `'0'..='8'` is shared by all of them:
//!
//! | byte | action                                                  |
//! |------|---------------------------------------------------------|
//! | `0`  | stop gate                                               |
//! | `1`  | open gate                                               |
//! | `2`  | close gate                                              |
//! | `3`–`6` | toggle auxiliary relay CH3–CH6                       |
//! | `7`  | all auxiliary relays on, gate relays forced off         |
//! | `8`  | gate stopped, every auxiliary relay off                 |

use log::debug;
use serde_json::Value;

use crate::app::ports::{ConfigError, RelayChannel};
use crate::gate::BlockReason;

/// One command from the relay byte space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    Stop,
    Open,
    Close,
    /// CH3..CH6 only.
    ToggleAux(RelayChannel),
    AllAuxOn,
    AllOff,
}

impl RelayCommand {
    pub const fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'0' => Self::Stop,
            b'1' => Self::Open,
            b'2' => Self::Close,
            b'3' => Self::ToggleAux(RelayChannel::Ch3),
            b'4' => Self::ToggleAux(RelayChannel::Ch4),
            b'5' => Self::ToggleAux(RelayChannel::Ch5),
            b'6' => Self::ToggleAux(RelayChannel::Ch6),
            b'7' => Self::AllAuxOn,
            b'8' => Self::AllOff,
            _ => return None,
        })
    }

    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Stop => b'0',
            Self::Open => b'1',
            Self::Close => b'2',
            Self::ToggleAux(ch) => b'0' + ch.number(),
            Self::AllAuxOn => b'7',
            Self::AllOff => b'8',
        }
    }

    /// Stop, open and close pause automation before acting.
    pub const fn is_gate_command(self) -> bool {
        matches!(self, Self::Stop | Self::Open | Self::Close)
    }
}

/// Decode a multi-byte payload one byte at a time. Bytes outside the
/// command space are skipped with a notice; line endings silently.
pub fn relay_commands(payload: &[u8]) -> impl Iterator<Item = RelayCommand> + '_ {
    payload.iter().filter_map(|&b| {
        let cmd = RelayCommand::from_byte(b);
        if cmd.is_none() && !matches!(b, b'\r' | b'\n') {
            debug!("commands: non-instruction data 0x{:02X} ignored", b);
        }
        cmd
    })
}

/// Target of a `{"data": {...}}` channel write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTarget {
    Relay(RelayChannel),
    /// The `ALL` key.
    All,
}

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Relay(RelayCommand),

    /// Clear the latch, enable automation, end any takeover.
    EnableAuto,

    /// Bounded pause: a manual takeover of the recovery duration.
    PauseAuto,

    /// Disable automation until [`EnableAuto`](Self::EnableAuto).
    LatchAutoOff,

    EndManualTakeover,

    /// Replace the automation rule document (raw JSON body).
    UpdateControlConfig(String),

    /// Re-read the stored rule document on the next tick.
    ReloadControlConfig,

    /// Level-style write; turned into a [`RelayCommand`] only when it
    /// would change something.
    SetChannel { target: ChannelTarget, on: bool },
}

impl AppCommand {
    /// Parse a string command, or a single relay byte.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Some(match text {
            "gate_open" => Self::Relay(RelayCommand::Open),
            "gate_close" => Self::Relay(RelayCommand::Close),
            "gate_stop" => Self::Relay(RelayCommand::Stop),
            "auto_on" => Self::EnableAuto,
            "auto_off" => Self::PauseAuto,
            "auto_latch_off" => Self::LatchAutoOff,
            "manual_end" => Self::EndManualTakeover,
            "reload_config" => Self::ReloadControlConfig,
            _ => match text.as_bytes() {
                [b] => Self::Relay(RelayCommand::from_byte(*b)?),
                _ => return None,
            },
        })
    }

    /// Decode a JSON command body:
    ///
    /// - `{"cmd": "gate_open"}`
    /// - `{"data": {"CH1": 1, "CH4": 0, "ALL": 1}}`
    pub fn from_json(body: &str) -> Result<Vec<Self>, CommandError> {
        let value: Value = serde_json::from_str(body).map_err(|_| CommandError::Malformed)?;
        let mut out = Vec::new();

        if let Some(cmd) = value.get("cmd") {
            let cmd = cmd.as_str().and_then(Self::parse).ok_or(CommandError::Malformed)?;
            out.push(cmd);
        }

        if let Some(data) = value.get("data") {
            let map = data.as_object().ok_or(CommandError::Malformed)?;
            for (key, level) in map {
                let target = parse_channel_key(key).ok_or(CommandError::Malformed)?;
                let on = match level {
                    Value::Bool(b) => *b,
                    Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
                    _ => return Err(CommandError::Malformed),
                };
                out.push(Self::SetChannel { target, on });
            }
        }

        if out.is_empty() {
            return Err(CommandError::Malformed);
        }
        Ok(out)
    }
}

fn parse_channel_key(key: &str) -> Option<ChannelTarget> {
    if key.eq_ignore_ascii_case("ALL") || key.eq_ignore_ascii_case("CH7") {
        return Some(ChannelTarget::All);
    }
    let rest = key.strip_prefix("CH").or_else(|| key.strip_prefix("ch"))?;
    let n: u8 = rest.parse().ok()?;
    RelayChannel::from_number(n).map(ChannelTarget::Relay)
}

/// Why a command did not take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The gate refused the request.
    Blocked(BlockReason),
    /// The body could not be decoded as a command.
    Malformed,
    /// The rule document did not parse; nothing was written.
    InvalidDocument,
    /// The rule document parsed but could not be stored.
    Storage(ConfigError),
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Blocked(reason) => write!(f, "{}", reason),
            Self::Malformed => write!(f, "malformed command"),
            Self::InvalidDocument => write!(f, "invalid control config JSON"),
            Self::Storage(e) => write!(f, "control config not saved: {}", e),
        }
    }
}

impl core::error::Error for CommandError {}

impl From<BlockReason> for CommandError {
    fn from(reason: BlockReason) -> Self {
        Self::Blocked(reason)
    }
}
