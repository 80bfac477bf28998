//! Scenario: Config hash stability
//!
//! GREEN when:
//! - Loading the same inputs twice yields the identical hash.
//! - Reordering keys within YAML does not change the hash.
//! - Different values produce different hashes.
//! - Later layers override earlier ones, deep-merging objects.

use afd_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
sync:
  max_chunk_len: 2000
  concurrency: 2
devices:
  - id: 1
    host: "172.18.5.241"
    user: "admin"
    password_env: "AFD_DEVICE_1_PASSWORD"
"#;

const BASE_YAML_REORDERED: &str = r#"
devices:
  - password_env: "AFD_DEVICE_1_PASSWORD"
    user: "admin"
    host: "172.18.5.241"
    id: 1
sync:
  concurrency: 2
  max_chunk_len: 2000
"#;

const OVERLAY_YAML: &str = r#"
sync:
  concurrency: 4
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha256 hex is 64 chars");
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn different_values_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_deep_merges_objects() {
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let v = &merged.config_json;
    assert_eq!(v.pointer("/sync/concurrency").and_then(|x| x.as_u64()), Some(4));
    assert_eq!(
        v.pointer("/sync/max_chunk_len").and_then(|x| x.as_u64()),
        Some(2000),
        "sibling keys in the base layer must survive the overlay"
    );
    assert_eq!(
        v.pointer("/devices/0/host").and_then(|x| x.as_str()),
        Some("172.18.5.241")
    );
}

#[test]
fn empty_layer_is_ignored() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, ""]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn invalid_yaml_is_an_error() {
    assert!(load_layered_yaml_from_strings(&["sync: [unclosed"]).is_err());
}
