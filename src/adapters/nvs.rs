//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the speed monitor.
//!
//! - One key per setting: each user setting is a postcard-encoded scalar
//!   under its own key in the `speedwatch` namespace, so a corrupted or
//!   missing value only affects that setting.  On load, a key that fails to
//!   decode or is out of range falls back to its default and is counted in
//!   [`diagnostics`](crate::diagnostics); the other keys are kept.
//! - Config validation: the whole config is range-checked before any key is
//!   written.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`; every
//!   key write commits.  Last write wins.
//! - Tunables (minimum calibration, flash table, display limit, GPS floor)
//!   are not persisted; they always come from [`SystemConfig::default`].

use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{self, PRESET_COUNT, SystemConfig, TARGET_RANGE};
use crate::diagnostics;
use crate::speed::calibration::MAX_CALIBRATION;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const SETTINGS_NAMESPACE: &str = "speedwatch";

const KEY_UNIT: &str = "unit";
const KEY_CALIBRATION: &str = "cal";
const KEY_TARGET: &str = "target";
const KEY_ALARM: &str = "alarm";
const KEY_AVERAGING: &str = "avg";
const KEY_INPUT: &str = "input";
const KEY_PRESETS: [&str; PRESET_COUNT] = ["preset1", "preset2", "preset3", "preset4"];

/// Largest encoded scalar (u32 varint is 5 bytes; f32 is 4).
const VALUE_BUF_LEN: usize = 16;

/// NVS key and namespace names are limited to 15 characters.
#[cfg(target_os = "espidf")]
const NVS_NAME_MAX: usize = 15;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
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
            store: HashMap::new(),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Null-terminated copy of an NVS name, truncated to the NVS limit.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; NVS_NAME_MAX + 1] {
        let mut buf = [0u8; NVS_NAME_MAX + 1];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NVS_NAME_MAX);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Decode one setting.  A missing key yields `default`, and so does a
    /// stored value that fails to decode or that `valid` refuses.  Only a
    /// storage I/O failure is an error.
    fn get<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
        valid: impl FnOnce(&T) -> bool,
    ) -> Result<T, ConfigError> {
        let mut buf = [0u8; VALUE_BUF_LEN];
        let len = match self.read(SETTINGS_NAMESPACE, key, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Ok(default),
            Err(e) => return Err(e.into()),
        };
        match postcard::from_bytes::<T>(&buf[..len]) {
            Ok(value) if valid(&value) => Ok(value),
            Ok(_) => {
                warn!("NvsAdapter: '{}' out of range, using default", key);
                diagnostics::record_settings_fallback();
                Ok(default)
            }
            Err(_) => {
                warn!("NvsAdapter: '{}' corrupted, using default", key);
                diagnostics::record_settings_fallback();
                Ok(default)
            }
        }
    }

    fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), ConfigError> {
        let mut buf = [0u8; VALUE_BUF_LEN];
        let bytes = postcard::to_slice(value, &mut buf).map_err(|_| ConfigError::IoError)?;
        self.write(SETTINGS_NAMESPACE, key, bytes)?;
        Ok(())
    }
}

fn any<T>(_: &T) -> bool {
    true
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let d = SystemConfig::default();
        let in_target_range = |v: &f32| TARGET_RANGE.contains(v);

        let mut presets = d.alarm_presets;
        for (slot, key) in presets.iter_mut().zip(KEY_PRESETS) {
            *slot = self.get(key, *slot, in_target_range)?;
        }

        let min_cal = d.min_calibration;
        let cfg = SystemConfig {
            unit: self.get(KEY_UNIT, d.unit, any)?,
            calibration_constant: self.get(KEY_CALIBRATION, d.calibration_constant, |c| {
                (min_cal + 1..=MAX_CALIBRATION).contains(c)
            })?,
            speed_target: self.get(KEY_TARGET, d.speed_target, in_target_range)?,
            alarm_enabled: self.get(KEY_ALARM, d.alarm_enabled, any)?,
            speed_averaging: self.get(KEY_AVERAGING, d.speed_averaging, any)?,
            alarm_presets: presets,
            input_source: self.get(KEY_INPUT, d.input_source, any)?,
            ..d
        };
        // Every field was checked above; this only guards the tunables.
        config::validate(&cfg)?;
        info!(
            "NvsAdapter: settings loaded (cal={} unit={})",
            cfg.calibration_constant,
            cfg.unit.label()
        );
        Ok(cfg)
    }

    fn save(&mut self, cfg: &SystemConfig) -> Result<(), ConfigError> {
        config::validate(cfg)?;

        self.put(KEY_UNIT, &cfg.unit)?;
        self.put(KEY_CALIBRATION, &cfg.calibration_constant)?;
        self.put(KEY_TARGET, &cfg.speed_target)?;
        self.put(KEY_ALARM, &cfg.alarm_enabled)?;
        self.put(KEY_AVERAGING, &cfg.speed_averaging)?;
        for (key, value) in KEY_PRESETS.iter().zip(cfg.alarm_presets.iter()) {
            self.put(key, value)?;
        }
        self.put(KEY_INPUT, &cfg.input_source)?;
        info!("NvsAdapter: settings saved");
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.get(&Self::composite_key(namespace, key)) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) => {
                    warn!("NvsAdapter: read error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
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
                warn!("NvsAdapter: write error {}", e);
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store.contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::c_name(key);
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let ret =
                    unsafe { nvs_find_key(handle, key.as_ptr() as *const _, core::ptr::null_mut()) };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}
