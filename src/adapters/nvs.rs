//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`ControlConfigPort`]:
//!
//! | key       | content                                  | codec    |
//! |-----------|------------------------------------------|----------|
//! | `gatecfg` | [`GateConfig`] device tunables           | postcard |
//! | `ctrl`    | [`ControlConfig`] automation rules       | JSON     |
//!
//! Both live in the `pondgate` namespace. ESP-IDF NVS commits are atomic
//! per `nvs_commit()`, so a power cut never leaves half a document.
//! The simulation backend keeps blobs in memory for host tests.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, ControlConfigPort};
use crate::automation::rules::ControlConfig;
use crate::config::GateConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "pondgate";
const GATE_CONFIG_KEY: &str = "gatecfg";
const CONTROL_CONFIG_KEY: &str = "ctrl";

/// Largest blob read back; the rule document is the big one.
const MAX_BLOB_SIZE: usize = 8_192;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    // ── Blob primitives ───────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(key: &str) -> String {
        format!("{}::{}", NAMESPACE, key)
    }

    #[cfg(not(target_os = "espidf"))]
    fn get_blob(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        self.store
            .borrow()
            .get(&Self::composite_key(key))
            .cloned()
            .ok_or(ConfigError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_blob(&self, key: &str, bytes: &[u8]) -> Result<(), ConfigError> {
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::StorageFull);
        }
        self.store.borrow_mut().insert(Self::composite_key(key), bytes.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn get_blob(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let key_buf = nvs_key(key);
        let result = Self::with_nvs_handle(NAMESPACE, false, |handle| {
            let mut size: usize = 0;
            // First call: get size
            let ret = unsafe { nvs_get_blob(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut(), &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe { nvs_get_blob(handle, key_buf.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(bytes),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(ConfigError::NotFound),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: read of '{}' failed ({})", key, e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn set_blob(&self, key: &str, bytes: &[u8]) -> Result<(), ConfigError> {
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::StorageFull);
        }
        let key_buf = nvs_key(key);
        let result = Self::with_nvs_handle(NAMESPACE, true, |handle| {
            let ret = unsafe { nvs_set_blob(handle, key_buf.as_ptr() as *const _, bytes.as_ptr() as *const _, bytes.len()) };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NvsAdapter: write of '{}' failed ({})", key, e);
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                ConfigError::StorageFull
            } else {
                ConfigError::IoError
            }
        })
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = nvs_key(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: ns_buf is NUL-terminated; handle is closed below.
        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// NUL-terminated NVS name (15 chars max).
#[cfg(target_os = "espidf")]
fn nvs_key(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<GateConfig, ConfigError> {
        match self.get_blob(GATE_CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: GateConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded gate config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(ConfigError::NotFound) => {
                info!("NvsAdapter: no stored gate config, using defaults");
                Ok(GateConfig::default())
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, config: &GateConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.set_blob(GATE_CONFIG_KEY, &bytes)?;
        info!("NvsAdapter: gate config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl ControlConfigPort for NvsAdapter {
    fn load_control(&self) -> Result<ControlConfig, ConfigError> {
        let bytes = self.get_blob(CONTROL_CONFIG_KEY)?;
        let text = core::str::from_utf8(&bytes).map_err(|_| ConfigError::Corrupted)?;
        ControlConfig::from_json(text).map_err(|e| {
            warn!("NvsAdapter: stored control config does not parse: {}", e);
            ConfigError::Corrupted
        })
    }

    fn save_control_text(&self, text: &str) -> Result<(), ConfigError> {
        self.set_blob(CONTROL_CONFIG_KEY, text.as_bytes())?;
        info!("NvsAdapter: control config saved ({} bytes)", text.len());
        Ok(())
    }
}

impl Default for NvsAdapter {
    fn default() -> Self {
        // Last-resort fallback when flash init failed: nothing persists.
        Self::new().unwrap_or(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }
}
