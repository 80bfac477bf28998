//! Scenario: Typed sync configuration
//!
//! # Invariants under test
//!
//! 1. Omitted `sync:` keys take their defaults.
//! 2. At least one device is required.
//! 3. Device ids are non-zero and unique; negatives are valid ids.
//! 4. `max_chunk_len` and `concurrency` must be >= 1.
//! 5. Unknown keys inside a device entry are rejected.
//! 6. Device order is preserved.

use afd_config::{load_layered_yaml_from_strings, SyncConfig};

fn load(yaml: &str) -> anyhow::Result<SyncConfig> {
    let loaded = load_layered_yaml_from_strings(&[yaml])?;
    SyncConfig::from_config_json(&loaded.config_json)
}

fn err_of(yaml: &str) -> String {
    format!("{:#}", load(yaml).unwrap_err())
}

#[test]
fn defaults_apply_when_sync_section_is_absent() {
    let cfg = load(
        r#"
devices:
  - id: 7
    name: "front-door"
    host: "172.18.5.241"
    user: "admin"
    password_env: "AFD_DEVICE_7_PASSWORD"
"#,
    )
    .unwrap();
    assert_eq!(cfg.sync.max_chunk_len, 2000);
    assert_eq!(cfg.sync.concurrency, 1);
    assert_eq!(cfg.sync.state_path, "nsr.json");
    assert_eq!(cfg.sync.request_timeout_secs, 30);
    assert!(cfg.sync.accept_invalid_certs);
    assert_eq!(cfg.devices[0].label(), "front-door");
}

#[test]
fn no_devices_is_invalid() {
    let err = err_of("sync:\n  concurrency: 2\n");
    assert!(err.contains("at least one device"), "{err}");
}

#[test]
fn zero_device_id_is_invalid() {
    let err = err_of(
        r#"
devices:
  - id: 0
    host: "h"
    user: "u"
    password_env: "P"
"#,
    );
    assert!(err.contains("CONFIG_INVALID"), "{err}");
}

#[test]
fn negative_device_id_is_valid() {
    let cfg = load(
        r#"
devices:
  - id: -3
    host: "h"
    user: "u"
    password_env: "P"
"#,
    )
    .unwrap();
    assert_eq!(cfg.devices[0].id.get(), -3);
}

#[test]
fn duplicate_device_ids_are_invalid() {
    let err = err_of(
        r#"
devices:
  - { id: 1, host: "a", user: "u", password_env: "P1" }
  - { id: 1, host: "b", user: "u", password_env: "P2" }
"#,
    );
    assert!(err.contains("duplicate device id 1"), "{err}");
}

#[test]
fn zero_chunk_len_and_concurrency_are_invalid() {
    let device = "devices:\n  - { id: 1, host: a, user: u, password_env: P }\n";
    let err = err_of(&format!("sync:\n  max_chunk_len: 0\n{device}"));
    assert!(err.contains("max_chunk_len"), "{err}");
    let err = err_of(&format!("sync:\n  concurrency: 0\n{device}"));
    assert!(err.contains("concurrency"), "{err}");
}

#[test]
fn unknown_device_field_is_rejected() {
    let err = err_of(
        r#"
devices:
  - { id: 1, host: a, user: u, password_env: P, hots: typo }
"#,
    );
    assert!(err.contains("CONFIG_INVALID"), "{err}");
    assert!(err.contains("hots"), "{err}");
}

#[test]
fn device_order_is_configuration_order() {
    let cfg = load(
        r#"
devices:
  - { id: 30, host: c, user: u, password_env: P3 }
  - { id: 10, host: a, user: u, password_env: P1 }
  - { id: 20, host: b, user: u, password_env: P2 }
"#,
    )
    .unwrap();
    let ids: Vec<i64> = cfg.device_ids().iter().map(|d| d.get()).collect();
    assert_eq!(ids, vec![30, 10, 20]);
    assert_eq!(cfg.device(cfg.devices[1].id).map(|d| d.host.as_str()), Some("a"));
}
