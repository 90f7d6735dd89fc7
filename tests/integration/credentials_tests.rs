//! Credential persistence across simulated boots.

use crate::mock_hw::MemStorage;

use irrigation_node::app::credentials::{CredentialStore, Credentials};

#[test]
fn save_survives_a_reboot() {
    let mut first_boot = CredentialStore::new(MemStorage::new());
    first_boot.save(&Credentials::new("net", "secret").unwrap()).unwrap();

    // Next boot: a fresh store over the same flash contents.
    let flash = first_boot.storage();
    let mut reloaded = MemStorage::new();
    reloaded.put_str("WIFI_SSID", &flash.get_str("WIFI_SSID").unwrap());
    reloaded.put_str("WIFI_BSSID", &flash.get_str("WIFI_BSSID").unwrap());
    let mut second_boot = CredentialStore::new(reloaded);

    let loaded = second_boot.load();
    assert!(loaded.loaded);
    assert_eq!(loaded.network_id.as_str(), "net");
    assert_eq!(loaded.secret.as_str(), "secret");
}

#[test]
fn provisioned_store_is_not_rewritten_with_same_values() {
    let mut store = CredentialStore::new(MemStorage::provisioned("garden-ap", "hunter22hunter22"));
    let supplied = Credentials::new("garden-ap", "hunter22hunter22").unwrap();

    let used = store.reconcile(Some(&supplied));

    assert_eq!(used.network_id.as_str(), "garden-ap");
    assert_eq!(store.storage().writes, 0);
    assert_eq!(store.storage().commits, 0);
}

#[test]
fn changed_values_overwrite_the_store() {
    let mut store = CredentialStore::new(MemStorage::provisioned("old-ap", "oldsecret"));
    let supplied = Credentials::new("new-ap", "newsecret").unwrap();

    let used = store.reconcile(Some(&supplied));

    assert_eq!(used.network_id.as_str(), "new-ap");
    assert_eq!(store.storage().get_str("WIFI_SSID").as_deref(), Some("new-ap"));
    assert_eq!(store.storage().commits, 1);
}

#[test]
fn failing_flash_still_uses_supplied_values() {
    let mut storage = MemStorage::new();
    storage.fail_writes = true;
    let mut store = CredentialStore::new(storage);
    let supplied = Credentials::new("garden-ap", "hunter22hunter22").unwrap();

    let used = store.reconcile(Some(&supplied));

    assert!(used.loaded);
    assert_eq!(used.network_id.as_str(), "garden-ap");
    assert_eq!(store.storage().get_str("WIFI_SSID"), None);
}

#[test]
fn missing_fields_load_as_unconfigured() {
    let mut store = CredentialStore::new(MemStorage::new());
    let loaded = store.load();
    assert!(loaded.loaded);
    assert!(!loaded.is_configured());
    assert_eq!(store.storage().inits, 1);
}
