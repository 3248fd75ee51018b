//! Device tunables.
//!
//! Timing windows, sensor addressing, and level limits for the gate
//! controller. Stored as a postcard blob in NVS; the automation rules
//! themselves live in a separate JSON document (see
//! [`crate::automation::rules`]).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    // --- Sensors ---
    /// Modbus address of the inner-pond level sensor
    pub inner_sensor_id: u8,
    /// Modbus address of the outer-pond level sensor
    pub outer_sensor_id: u8,

    // --- Gate ---
    /// Whether automation starts enabled after boot
    pub auto_control_enabled: bool,
    /// Fixed relay on-time for a normal open/close stroke (seconds)
    pub action_duration_s: u32,
    /// Minimum idle time between automated actions (seconds)
    pub min_action_interval_s: u32,
    /// Runaway limit; exceeding it is a fatal stop (seconds)
    pub max_continuous_run_s: u32,
    /// Automation pause after a manual gate command (seconds)
    pub manual_recover_s: u32,

    // --- Sensor health ---
    /// Age after which a sample counts as stale for alarms (ms)
    pub sensor_data_timeout_ms: u32,
    /// Age after which a sensor is reported offline (ms)
    pub sensor_online_grace_ms: u32,
    /// Per-attempt Modbus response window (ms)
    pub modbus_timeout_ms: u32,
    /// Delay between Modbus attempts (ms)
    pub modbus_retry_gap_ms: u32,
    /// Modbus attempts per poll
    pub modbus_retry_count: u8,

    // --- Level limits ---
    pub level_jump_threshold_mm_per_s: u32,
    pub level_min_mm: u16,
    pub level_max_mm: u16,
    /// How long a jump/range warning stays raised (ms)
    pub level_alarm_window_ms: u32,

    // --- Timing ---
    /// Sensor poll interval; one sensor per poll, alternating (ms)
    pub sensor_poll_interval_ms: u32,
    /// Measurement log interval (ms)
    pub measure_log_interval_ms: u32,
    /// Minimum spacing of blocked-command console notices (ms)
    pub block_log_interval_ms: u32,
    /// Console level line interval (ms)
    pub level_log_interval_ms: u32,
    /// Control loop period (ms)
    pub control_loop_interval_ms: u32,
    /// Telemetry report interval (seconds)
    pub telemetry_interval_secs: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            // Sensors
            inner_sensor_id: 0x01,
            outer_sensor_id: 0x02,

            // Gate
            auto_control_enabled: true,
            action_duration_s: 10,
            min_action_interval_s: 15,
            max_continuous_run_s: 260,
            manual_recover_s: 120,

            // Sensor health
            sensor_data_timeout_ms: 6_000,
            sensor_online_grace_ms: 3_000,
            modbus_timeout_ms: 250,
            modbus_retry_gap_ms: 80,
            modbus_retry_count: 2,

            // Level limits
            level_jump_threshold_mm_per_s: 1_000,
            level_min_mm: 0,
            level_max_mm: 10_000,
            level_alarm_window_ms: 15_000,

            // Timing
            sensor_poll_interval_ms: 1_000,
            measure_log_interval_ms: 60_000,
            block_log_interval_ms: 5_000,
            level_log_interval_ms: 8_000,
            control_loop_interval_ms: 50,
            telemetry_interval_secs: 10,
        }
    }
}

impl GateConfig {
    pub fn action_duration_ms(&self) -> u32 {
        self.action_duration_s.saturating_mul(1000)
    }

    pub fn min_action_interval_ms(&self) -> u32 {
        self.min_action_interval_s.saturating_mul(1000)
    }

    pub fn max_continuous_run_ms(&self) -> u32 {
        self.max_continuous_run_s.saturating_mul(1000)
    }

    pub fn manual_recover_ms(&self) -> u32 {
        self.manual_recover_s.saturating_mul(1000)
    }

    /// Range-check every field. Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inner_sensor_id == 0 || self.outer_sensor_id == 0 {
            return Err(ConfigError::ValidationFailed("sensor ids must be non-zero"));
        }
        if self.inner_sensor_id == self.outer_sensor_id {
            return Err(ConfigError::ValidationFailed("sensor ids must differ"));
        }
        if !(1..=600).contains(&self.action_duration_s) {
            return Err(ConfigError::ValidationFailed("action_duration_s must be 1..=600"));
        }
        if self.max_continuous_run_s <= self.action_duration_s {
            return Err(ConfigError::ValidationFailed(
                "max_continuous_run_s must exceed action_duration_s",
            ));
        }
        if self.max_continuous_run_s > 3_600 {
            return Err(ConfigError::ValidationFailed("max_continuous_run_s must be <= 3600"));
        }
        if !(1..=5).contains(&self.modbus_retry_count) {
            return Err(ConfigError::ValidationFailed("modbus_retry_count must be 1..=5"));
        }
        if !(20..=2_000).contains(&self.modbus_timeout_ms) {
            return Err(ConfigError::ValidationFailed("modbus_timeout_ms must be 20..=2000"));
        }
        if self.level_min_mm >= self.level_max_mm {
            return Err(ConfigError::ValidationFailed("level_min_mm must be < level_max_mm"));
        }
        if self.sensor_online_grace_ms > self.sensor_data_timeout_ms {
            return Err(ConfigError::ValidationFailed(
                "sensor_online_grace_ms must be <= sensor_data_timeout_ms",
            ));
        }
        if !(10..=1_000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 10..=1000",
            ));
        }
        if self.sensor_poll_interval_ms < self.control_loop_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "sensor_poll_interval_ms must be >= control_loop_interval_ms",
            ));
        }
        if !(1..=3_600).contains(&self.telemetry_interval_secs) {
            return Err(ConfigError::ValidationFailed("telemetry_interval_secs must be 1..=3600"));
        }
        Ok(())
    }
}
