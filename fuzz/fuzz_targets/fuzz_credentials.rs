//! Fuzz target: stored Wi-Fi credential decoding and validation
//!
//! Feeds arbitrary flash contents through the same decode path the
//! credential store uses on boot, then through the provisioning validators.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A decoded value never exceeds its field capacity or contains a NUL
//! - Anything that passes validation can be turned into `Credentials`
//!
//! cargo fuzz run fuzz_credentials

#![no_main]

use irrigation_node::app::credentials::{
    Credentials, MAX_SECRET_LEN, MAX_SSID_LEN, decode_nvs_str, validate_secret, validate_ssid,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the split between the SSID and secret blobs.
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let mid = usize::from(split).min(rest.len());
    let (ssid_bytes, secret_bytes) = rest.split_at(mid);

    let ssid = decode_nvs_str::<MAX_SSID_LEN>(ssid_bytes);
    let secret = decode_nvs_str::<MAX_SECRET_LEN>(secret_bytes);

    if let Some(s) = &ssid {
        assert!(s.len() <= MAX_SSID_LEN);
        assert!(!s.as_bytes().contains(&0));
    }
    if let Some(s) = &secret {
        assert!(s.len() <= MAX_SECRET_LEN);
        assert!(!s.as_bytes().contains(&0));
    }

    if let (Some(ssid), Some(secret)) = (ssid, secret) {
        if validate_ssid(&ssid).is_ok() && validate_secret(&secret).is_ok() {
            let creds = Credentials::new(&ssid, &secret).expect("validated input must build");
            assert!(creds.is_configured());
        }
    }
});
