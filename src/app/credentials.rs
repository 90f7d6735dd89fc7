//! Persisted Wi-Fi credentials.
//!
//! Two NUL-terminated strings under the `storage` namespace:
//!
//! | Key          | Max bytes | Content        |
//! |--------------|-----------|----------------|
//! | `WIFI_SSID`  | 32        | network name   |
//! | `WIFI_BSSID` | 64        | passphrase     |
//!
//! Three load outcomes are kept apart:
//! - the store cannot be opened → `loaded = false`, networking stays off;
//! - the store opens but a field is missing → `loaded = true`, empty strings;
//! - both fields present → `loaded = true` with the stored values.

use core::fmt;

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};

pub const NAMESPACE: &str = "storage";
pub const SSID_KEY: &str = "WIFI_SSID";
pub const SECRET_KEY: &str = "WIFI_BSSID";

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_SECRET_LEN: usize = 64;

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// The store could be opened.  `false` means "do not start networking".
    pub loaded: bool,
    pub network_id: heapless::String<MAX_SSID_LEN>,
    pub secret: heapless::String<MAX_SECRET_LEN>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    InvalidSsid,
    InvalidSecret,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 bytes, no NUL)"),
            Self::InvalidSecret => write!(f, "password invalid (at most 64 bytes, no NUL)"),
        }
    }
}

impl Credentials {
    /// Validated credentials, marked loaded.
    pub fn new(network_id: &str, secret: &str) -> Result<Self, CredentialError> {
        validate_ssid(network_id)?;
        validate_secret(secret)?;
        let mut creds = Self {
            loaded: true,
            ..Default::default()
        };
        creds
            .network_id
            .push_str(network_id)
            .map_err(|_| CredentialError::InvalidSsid)?;
        creds
            .secret
            .push_str(secret)
            .map_err(|_| CredentialError::InvalidSecret)?;
        Ok(creds)
    }

    /// Store could not be opened.
    pub fn not_provisioned() -> Self {
        Self::default()
    }

    /// Credentials baked in at build time, if any.
    ///
    /// `IRRIGATION_WIFI_SSID` / `IRRIGATION_WIFI_PASSWORD`.  Invalid values
    /// are logged and ignored.
    pub fn from_build_env() -> Option<Self> {
        let ssid = option_env!("IRRIGATION_WIFI_SSID")?;
        let secret = option_env!("IRRIGATION_WIFI_PASSWORD").unwrap_or("");
        match Self::new(ssid, secret) {
            Ok(creds) => Some(creds),
            Err(e) => {
                warn!("WiFi: build-time credentials ignored: {}", e);
                None
            }
        }
    }

    /// Loaded and carrying a network name.
    pub fn is_configured(&self) -> bool {
        self.loaded && !self.network_id.is_empty()
    }

    fn same_values(&self, other: &Self) -> bool {
        self.network_id == other.network_id && self.secret == other.secret
    }
}

// ───────────────────────────────────────────────────────────────
// Validation / decoding
// ───────────────────────────────────────────────────────────────

/// Shortest passphrase WPA2-PSK accepts; shorter ones are stored anyway.
pub const WPA2_MIN_SECRET_LEN: usize = 8;

// Values are stored NUL-terminated, so an embedded NUL would truncate them.
fn fits_field(s: &str, cap: usize) -> bool {
    s.len() <= cap && !s.as_bytes().contains(&0)
}

pub fn validate_ssid(ssid: &str) -> Result<(), CredentialError> {
    if ssid.is_empty() || !fits_field(ssid, MAX_SSID_LEN) {
        return Err(CredentialError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_secret(secret: &str) -> Result<(), CredentialError> {
    if !fits_field(secret, MAX_SECRET_LEN) {
        return Err(CredentialError::InvalidSecret);
    }
    Ok(())
}

/// Decode a stored string: bytes up to the first NUL, valid UTF-8, at most
/// `N` bytes.  Anything else reads as missing.
pub fn decode_nvs_str<const N: usize>(bytes: &[u8]) -> Option<heapless::String<N>> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = core::str::from_utf8(&bytes[..end]).ok()?;
    let mut out = heapless::String::new();
    out.push_str(text).ok()?;
    Some(out)
}

// ───────────────────────────────────────────────────────────────
// Store
// ───────────────────────────────────────────────────────────────

pub struct CredentialStore<S: StoragePort> {
    storage: S,
    initialized: bool,
}

enum Field<const N: usize> {
    Value(heapless::String<N>),
    Missing,
    Unavailable(i32),
}

impl<S: StoragePort> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            initialized: false,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Initialise the flash partition once per boot.
    pub fn ensure_init(&mut self) -> Result<(), StorageError> {
        if self.initialized {
            return Ok(());
        }
        self.storage.init()?;
        self.initialized = true;
        Ok(())
    }

    pub fn load(&mut self) -> Credentials {
        if let Err(e) = self.ensure_init() {
            warn!("NVS: {}, treating as unprovisioned", e);
            return Credentials::not_provisioned();
        }

        let network_id = match self.read_field::<{ MAX_SSID_LEN }>(SSID_KEY) {
            Field::Unavailable(rc) => {
                warn!("NVS: cannot open '{}' (rc={}), treating as unprovisioned", NAMESPACE, rc);
                return Credentials::not_provisioned();
            }
            Field::Missing => None,
            Field::Value(v) => Some(v),
        };
        let secret = match self.read_field::<{ MAX_SECRET_LEN }>(SECRET_KEY) {
            Field::Unavailable(rc) => {
                warn!("NVS: cannot open '{}' (rc={}), treating as unprovisioned", NAMESPACE, rc);
                return Credentials::not_provisioned();
            }
            Field::Missing => None,
            Field::Value(v) => Some(v),
        };

        match (network_id, secret) {
            (Some(network_id), Some(secret)) => {
                info!("NVS: Wi-Fi credentials found (SSID='{}')", network_id);
                Credentials {
                    loaded: true,
                    network_id,
                    secret,
                }
            }
            _ => {
                warn!("NVS: no Wi-Fi credentials stored");
                Credentials {
                    loaded: true,
                    ..Default::default()
                }
            }
        }
    }

    /// Write both fields and commit.
    pub fn save(&mut self, credentials: &Credentials) -> Result<(), StorageError> {
        self.ensure_init()?;
        self.write_field(SSID_KEY, &credentials.network_id)?;
        self.write_field(SECRET_KEY, &credentials.secret)?;
        self.storage.commit(NAMESPACE)?;
        info!("NVS: Wi-Fi credentials saved (SSID='{}')", credentials.network_id);
        Ok(())
    }

    /// Merge freshly supplied credentials with the stored ones.
    ///
    /// Returns the credentials to use this session.  Storage is only
    /// written when the supplied values are valid and differ from what is
    /// stored; a failed write is logged and the supplied values are still
    /// used.
    pub fn reconcile(&mut self, supplied: Option<&Credentials>) -> Credentials {
        let stored = self.load();
        if !stored.loaded {
            return stored;
        }

        let Some(supplied) = supplied.filter(|s| s.is_configured()) else {
            return stored;
        };
        if validate_ssid(&supplied.network_id).is_err() || validate_secret(&supplied.secret).is_err() {
            warn!("WiFi: supplied credentials do not fit the store, keeping stored ones");
            return stored;
        }
        if (1..WPA2_MIN_SECRET_LEN).contains(&supplied.secret.len()) {
            warn!(
                "WiFi: supplied password is {} bytes, WPA2 networks will reject it",
                supplied.secret.len()
            );
        }
        if stored.same_values(supplied) {
            return stored;
        }

        if let Err(e) = self.save(supplied) {
            warn!("NVS: saving credentials failed ({}), using them for this boot only", e);
        }
        Credentials {
            loaded: true,
            ..supplied.clone()
        }
    }

    fn read_field<const N: usize>(&self, key: &str) -> Field<N> {
        // Room for the terminator, plus one byte to detect overlong values.
        let mut buf = [0u8; MAX_SECRET_LEN + 2];
        match self.storage.read(NAMESPACE, key, &mut buf[..N + 2]) {
            Ok(len) => match decode_nvs_str::<N>(&buf[..len]) {
                Some(value) => Field::Value(value),
                None => {
                    warn!("NVS: stored '{}' is malformed, ignoring", key);
                    Field::Missing
                }
            },
            Err(StorageError::OpenFailed(rc)) => Field::Unavailable(rc),
            Err(StorageError::NotFound) => Field::Missing,
            Err(e) => {
                warn!("NVS: reading '{}' failed: {}", key, e);
                Field::Missing
            }
        }
    }

    fn write_field(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut buf = [0u8; MAX_SECRET_LEN + 1];
        let len = value.len().min(MAX_SECRET_LEN);
        buf[..len].copy_from_slice(&value.as_bytes()[..len]);
        self.storage.write(NAMESPACE, key, &buf[..=len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemStore {
        map: HashMap<(String, String), Vec<u8>>,
        open_fails: bool,
        write_fails: bool,
        inits: u32,
        writes: u32,
    }

    impl StoragePort for MemStore {
        fn init(&mut self) -> Result<(), StorageError> {
            self.inits += 1;
            Ok(())
        }

        fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
            if self.open_fails {
                return Err(StorageError::OpenFailed(0x1101));
            }
            let data = self
                .map
                .get(&(ns.to_owned(), key.to_owned()))
                .ok_or(StorageError::NotFound)?;
            if data.len() > buf.len() {
                return Err(StorageError::TooLong);
            }
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }

        fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
            if self.write_fails {
                return Err(StorageError::Io(-1));
            }
            self.writes += 1;
            self.map.insert((ns.to_owned(), key.to_owned()), data.to_vec());
            Ok(())
        }

        fn commit(&mut self, _ns: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[test]
    fn unopenable_store_is_not_loaded() {
        let mut store = CredentialStore::new(MemStore {
            open_fails: true,
            ..Default::default()
        });
        assert!(!store.load().loaded);
    }

    #[test]
    fn empty_store_is_loaded_but_unconfigured() {
        let mut store = CredentialStore::new(MemStore::default());
        let creds = store.load();
        assert!(creds.loaded);
        assert!(creds.network_id.is_empty());
        assert!(!creds.is_configured());
    }

    #[test]
    fn save_then_load() {
        let mut store = CredentialStore::new(MemStore::default());
        store.save(&Credentials::new("net", "secret").unwrap()).unwrap();
        let creds = store.load();
        assert_eq!(creds, Credentials::new("net", "secret").unwrap());
    }

    #[test]
    fn stored_strings_are_nul_terminated() {
        let mut store = CredentialStore::new(MemStore::default());
        store.save(&Credentials::new("net", "").unwrap()).unwrap();
        let raw = &store.storage().map[&(NAMESPACE.to_owned(), SSID_KEY.to_owned())];
        assert_eq!(raw.as_slice(), b"net\0");
    }

    #[test]
    fn init_runs_once() {
        let mut store = CredentialStore::new(MemStore::default());
        store.load();
        store.load();
        assert_eq!(store.storage().inits, 1);
    }

    #[test]
    fn reconcile_writes_only_on_change() {
        let mut store = CredentialStore::new(MemStore::default());
        let supplied = Credentials::new("home", "hunter22").unwrap();

        let used = store.reconcile(Some(&supplied));
        assert_eq!(used, supplied);
        assert_eq!(store.storage().writes, 2);

        let used = store.reconcile(Some(&supplied));
        assert_eq!(used, supplied);
        assert_eq!(store.storage().writes, 2);
    }

    #[test]
    fn reconcile_keeps_stored_when_nothing_supplied() {
        let mut store = CredentialStore::new(MemStore::default());
        store.save(&Credentials::new("home", "hunter22").unwrap()).unwrap();
        let used = store.reconcile(None);
        assert_eq!(used.network_id.as_str(), "home");
    }

    #[test]
    fn reconcile_never_enables_networking_on_unopenable_store() {
        let mut store = CredentialStore::new(MemStore {
            open_fails: true,
            ..Default::default()
        });
        let supplied = Credentials::new("home", "hunter22").unwrap();
        assert!(!store.reconcile(Some(&supplied)).loaded);
    }

    #[test]
    fn failed_save_still_uses_supplied() {
        let mut store = CredentialStore::new(MemStore {
            write_fails: true,
            ..Default::default()
        });
        let supplied = Credentials::new("home", "hunter22").unwrap();
        assert_eq!(store.reconcile(Some(&supplied)), supplied);
    }

    #[test]
    fn short_supplied_secret_is_used_and_persisted() {
        let mut store = CredentialStore::new(MemStore::default());
        let supplied = Credentials::new("net", "secret").unwrap();

        let used = store.reconcile(Some(&supplied));
        assert_eq!(used.network_id.as_str(), "net");
        assert_eq!(used.secret.as_str(), "secret");

        let reloaded = store.load();
        assert_eq!(reloaded.network_id.as_str(), "net");
        assert_eq!(reloaded.secret.as_str(), "secret");
    }

    #[test]
    fn decode_stops_at_nul_and_enforces_capacity() {
        assert_eq!(decode_nvs_str::<8>(b"abc\0zzz").unwrap().as_str(), "abc");
        assert_eq!(decode_nvs_str::<8>(b"").unwrap().as_str(), "");
        assert!(decode_nvs_str::<4>(b"abcde").is_none());
        assert!(decode_nvs_str::<8>(&[0xFF, 0xFE]).is_none());
    }

    #[test]
    fn validation_rules() {
        assert_eq!(Credentials::new("", "password1"), Err(CredentialError::InvalidSsid));
        assert_eq!(Credentials::new(&"x".repeat(33), ""), Err(CredentialError::InvalidSsid));
        assert_eq!(Credentials::new("bad\0name", ""), Err(CredentialError::InvalidSsid));
        assert_eq!(Credentials::new("net", &"y".repeat(65)), Err(CredentialError::InvalidSecret));
        assert_eq!(Credentials::new("net", "pa\0ss"), Err(CredentialError::InvalidSecret));
        assert!(Credentials::new("net", "short").is_ok());
        assert!(Credentials::new("OpenCafe", "").is_ok());
        assert!(Credentials::new(&"x".repeat(32), &"y".repeat(64)).is_ok());
    }
}
