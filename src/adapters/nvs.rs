//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the irrigation node.
//!
//! - Config: one postcard blob under `irrigation/syscfg`, range-checked
//!   before it is written and after it is read.
//! - Strings: values ending in a single NUL are stored as NVS strings so
//!   credentials provisioned by other tools (`nvs_set_str`) read back
//!   unchanged; anything else is a blob.
//! - A namespace that was never written reads as [`StorageError::NotFound`];
//!   only a partition that cannot be opened at all is
//!   [`StorageError::OpenFailed`].

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "irrigation";
const CONFIG_KEY: &str = "syscfg";

const MAX_BLOB_SIZE: usize = 1024;

/// NVS key and namespace names are limited to 15 bytes plus NUL.
const MAX_NAME_LEN: usize = 15;

/// Error code the simulation reports for an unavailable partition
/// (`ESP_ERR_NVS_PART_NOT_FOUND`).
#[cfg(not(target_os = "espidf"))]
const SIM_PART_NOT_FOUND: i32 = 0x1112;

/// Why an NVS operation failed: opening the namespace, or the operation itself.
#[cfg(target_os = "espidf")]
enum NvsFailure {
    Open(i32),
    Op(i32),
}

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
    #[cfg(not(target_os = "espidf"))]
    unavailable: bool,
    #[cfg(not(target_os = "espidf"))]
    commits: std::cell::Cell<u32>,
}

impl NvsAdapter {
    /// Create the adapter.  Flash is initialised by [`StoragePort::init`].
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
            #[cfg(not(target_os = "espidf"))]
            unavailable: false,
            #[cfg(not(target_os = "espidf"))]
            commits: std::cell::Cell::new(0),
        }
    }

    fn check_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(StorageError::TooLong);
        }
        Ok(())
    }

    /// `value\0` with no interior NUL.
    fn is_c_string(data: &[u8]) -> bool {
        matches!(data.split_last(), Some((0, body)) if !body.contains(&0))
    }
}

impl Default for NvsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ── ESP-IDF backend ───────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl NvsAdapter {
    fn c_name(name: &str) -> [u8; MAX_NAME_LEN + 1] {
        let mut buf = [0u8; MAX_NAME_LEN + 1];
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_NAME_LEN);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, NvsFailure>
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

        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(NvsFailure::Open(ret));
        }

        let result = f(handle).map_err(NvsFailure::Op);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    fn map_failure(failure: NvsFailure) -> StorageError {
        match failure {
            // A read-only open of a namespace that was never written.
            NvsFailure::Open(rc) if rc == ESP_ERR_NVS_NOT_FOUND as i32 => StorageError::NotFound,
            NvsFailure::Open(rc) => StorageError::OpenFailed(rc),
            NvsFailure::Op(rc) if rc == ESP_ERR_NVS_NOT_FOUND as i32 => StorageError::NotFound,
            NvsFailure::Op(rc) if rc == ESP_ERR_NVS_INVALID_LENGTH as i32 => StorageError::TooLong,
            NvsFailure::Op(rc) => StorageError::Io(rc),
        }
    }

    fn init_flash() -> Result<(), StorageError> {
        // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
        // single main-task context before any concurrent NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
            warn!("NVS: erasing and re-initialising flash partition (rc={})", ret);
            let ret = unsafe { nvs_flash_erase() };
            if ret != ESP_OK as i32 {
                return Err(StorageError::InitFailed(ret));
            }
            let ret = unsafe { nvs_flash_init() };
            if ret != ESP_OK as i32 {
                return Err(StorageError::InitFailed(ret));
            }
        } else if ret != ESP_OK as i32 {
            return Err(StorageError::InitFailed(ret));
        }
        info!("NVS: flash initialised");
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        Self::check_name(namespace)?;
        Self::check_name(key)?;
        let key = Self::c_name(key);
        Self::with_nvs_handle(namespace, false, |handle| {
            let mut size = buf.len();
            // SAFETY: `buf` is valid for `size` bytes; NVS writes at most that.
            let ret = unsafe {
                nvs_get_str(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret == ESP_OK as i32 {
                return Ok(size);
            }
            if ret != ESP_ERR_NVS_NOT_FOUND as i32 && ret != ESP_ERR_NVS_TYPE_MISMATCH as i32 {
                return Err(ret);
            }

            let mut size = buf.len();
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(size)
        })
        .map_err(Self::map_failure)
    }

    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        Self::check_name(namespace)?;
        Self::check_name(key)?;
        let key = Self::c_name(key);
        let as_string = Self::is_c_string(data);
        Self::with_nvs_handle(namespace, true, |handle| {
            // SAFETY: `key` and `data` outlive the call; string values were
            // checked to carry exactly one trailing NUL.
            let ret = unsafe {
                if as_string {
                    nvs_set_str(handle, key.as_ptr().cast(), data.as_ptr().cast())
                } else {
                    nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
                }
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(Self::map_failure)
    }

    fn flush(&self, namespace: &str) -> Result<(), StorageError> {
        Self::check_name(namespace)?;
        Self::with_nvs_handle(namespace, true, |handle| {
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(Self::map_failure)
    }

    fn get_blob_alloc(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let key = Self::c_name(key);
        Self::with_nvs_handle(namespace, false, |handle| {
            let mut size: usize = 0;

            // First call: get size
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        })
        .map_err(Self::map_failure)
    }
}

// ── Simulation backend ────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl NvsAdapter {
    /// Make every namespace fail to open, as an unformatted partition does.
    pub fn sim_set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Number of commits issued so far.
    pub fn sim_commits(&self) -> u32 {
        self.commits.get()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    fn open(&self) -> Result<(), StorageError> {
        if self.unavailable {
            return Err(StorageError::OpenFailed(SIM_PART_NOT_FOUND));
        }
        Ok(())
    }

    fn init_flash() -> Result<(), StorageError> {
        info!("NVS(sim): in-memory backend");
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        Self::check_name(namespace)?;
        Self::check_name(key)?;
        self.open()?;
        let store = self.store.borrow();
        let data = store
            .get(&Self::composite_key(namespace, key))
            .ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::TooLong);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        Self::check_name(namespace)?;
        Self::check_name(key)?;
        self.open()?;
        if !Self::is_c_string(data) && data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::TooLong);
        }
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn flush(&self, namespace: &str) -> Result<(), StorageError> {
        Self::check_name(namespace)?;
        self.open()?;
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }

    fn get_blob_alloc(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.open()?;
        self.store
            .borrow()
            .get(&Self::composite_key(namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

// ── Port implementations ──────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.get_blob_alloc(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NVS: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NVS: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(StorageError::OpenFailed(rc) | StorageError::Io(rc) | StorageError::InitFailed(rc)) => {
                Err(ConfigError::IoError(rc))
            }
            Err(StorageError::TooLong) => Err(ConfigError::Corrupted),
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::Corrupted)?;
        let to_config_error = |e: StorageError| match e {
            StorageError::OpenFailed(rc) | StorageError::Io(rc) | StorageError::InitFailed(rc) => {
                ConfigError::IoError(rc)
            }
            StorageError::NotFound | StorageError::TooLong => ConfigError::Corrupted,
        };
        self.put(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(to_config_error)?;
        self.flush(CONFIG_NAMESPACE).map_err(to_config_error)?;
        info!("NVS: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn init(&mut self) -> Result<(), StorageError> {
        Self::init_flash()
    }

    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.get(namespace, key, buf)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(namespace, key, data)
    }

    fn commit(&mut self, namespace: &str) -> Result<(), StorageError> {
        let result = self.flush(namespace);
        if let Err(e) = result {
            warn!("NVS: commit of '{}' failed: {}", namespace, e);
        }
        result
    }
}
