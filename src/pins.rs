//! GPIO / peripheral pin assignments for the 6-channel relay board.
//!
//! Single source of truth. Every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay outputs (active HIGH)
// ---------------------------------------------------------------------------

/// CH1: gate open-direction relay.
pub const RELAY_CH1_GPIO: i32 = 1;
/// CH2: gate close-direction relay.
pub const RELAY_CH2_GPIO: i32 = 2;
/// CH3..CH6: auxiliary relays (aerators, pumps, lights).
pub const RELAY_CH3_GPIO: i32 = 41;
pub const RELAY_CH4_GPIO: i32 = 42;
pub const RELAY_CH5_GPIO: i32 = 45;
pub const RELAY_CH6_GPIO: i32 = 46;

/// All relay outputs in channel order (index 0 = CH1).
pub const RELAY_GPIOS: [i32; 6] = [
    RELAY_CH1_GPIO,
    RELAY_CH2_GPIO,
    RELAY_CH3_GPIO,
    RELAY_CH4_GPIO,
    RELAY_CH5_GPIO,
    RELAY_CH6_GPIO,
];

// ---------------------------------------------------------------------------
// RS-485 sensor bus (auto-direction transceiver)
// ---------------------------------------------------------------------------

/// UART port used for the level sensors.
pub const SENSOR_UART_PORT: i32 = 1;
pub const SENSOR_UART_TX_GPIO: i32 = 17;
pub const SENSOR_UART_RX_GPIO: i32 = 18;
pub const SENSOR_UART_BAUD: u32 = 9_600;
