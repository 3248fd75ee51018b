//! RS-485 UART adapter for the Modbus level sensors.
//!
//! Implements [`SensorBus`] on top of the ESP-IDF UART driver. The
//! transceiver switches direction automatically, so the adapter only has
//! to flush, write, wait for TX done, and poll the RX ring buffer.
//!
//! On host builds the bus is an in-memory loopback: tests inject response
//! bytes and inspect the frames that were written.

use crate::app::ports::SensorBus;
use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init::HwInitError;
#[cfg(target_os = "espidf")]
use crate::pins;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
const RX_RING_SIZE: i32 = 256;
#[cfg(target_os = "espidf")]
const TX_DONE_TIMEOUT_TICKS: u32 = 100;

pub struct UartBus {
    #[cfg(target_os = "espidf")]
    port: uart_port_t,
    #[cfg(not(target_os = "espidf"))]
    rx: std::collections::VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    written: Vec<Vec<u8>>,
}

#[cfg(target_os = "espidf")]
impl UartBus {
    /// Install the UART driver on the sensor port (8N1).
    pub fn new() -> Result<Self, HwInitError> {
        let port = pins::SENSOR_UART_PORT as uart_port_t;
        // SAFETY: one-shot driver install from main() before the loop.
        unsafe {
            let cfg = uart_config_t {
                baud_rate: pins::SENSOR_UART_BAUD as i32,
                data_bits: uart_word_length_t_UART_DATA_8_BITS,
                parity: uart_parity_t_UART_PARITY_DISABLE,
                stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
                flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
                ..core::mem::zeroed()
            };
            let ret = uart_param_config(port, &cfg);
            if ret != ESP_OK {
                return Err(HwInitError::UartInitFailed(ret));
            }
            let ret = uart_set_pin(
                port,
                pins::SENSOR_UART_TX_GPIO,
                pins::SENSOR_UART_RX_GPIO,
                UART_PIN_NO_CHANGE,
                UART_PIN_NO_CHANGE,
            );
            if ret != ESP_OK {
                return Err(HwInitError::UartInitFailed(ret));
            }
            let ret = uart_driver_install(port, RX_RING_SIZE, 0, 0, core::ptr::null_mut(), 0);
            if ret != ESP_OK {
                return Err(HwInitError::UartInitFailed(ret));
            }
        }
        info!(
            "uart: sensor bus on UART{} ({} baud, TX={} RX={})",
            pins::SENSOR_UART_PORT,
            pins::SENSOR_UART_BAUD,
            pins::SENSOR_UART_TX_GPIO,
            pins::SENSOR_UART_RX_GPIO
        );
        Ok(Self { port })
    }
}

#[cfg(target_os = "espidf")]
impl SensorBus for UartBus {
    fn clear_input(&mut self) {
        // SAFETY: driver installed in new(); main-loop only.
        unsafe {
            uart_flush_input(self.port);
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), SensorError> {
        // SAFETY: frame outlives the call; the driver copies into its TX FIFO.
        let written = unsafe { uart_write_bytes(self.port, frame.as_ptr() as *const _, frame.len()) };
        if written < 0 || written as usize != frame.len() {
            return Err(SensorError::Bus);
        }
        if unsafe { uart_wait_tx_done(self.port, TX_DONE_TIMEOUT_TICKS) } != ESP_OK {
            return Err(SensorError::Bus);
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SensorError> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Zero tick timeout: copy what is buffered and return.
        let n = unsafe { uart_read_bytes(self.port, buf.as_mut_ptr() as *mut _, buf.len() as u32, 0) };
        usize::try_from(n).map_err(|_| SensorError::Bus)
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl UartBus {
    pub fn new() -> Result<Self, crate::drivers::hw_init::HwInitError> {
        log::info!("uart(sim): in-memory sensor bus");
        Ok(Self {
            rx: std::collections::VecDeque::new(),
            written: Vec::new(),
        })
    }

    /// Queue bytes as if a sensor had answered.
    pub fn inject_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Every frame written so far, oldest first.
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }
}

#[cfg(not(target_os = "espidf"))]
impl SensorBus for UartBus {
    fn clear_input(&mut self) {
        self.rx.clear();
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), SensorError> {
        self.written.push(frame.to_vec());
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SensorError> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}
