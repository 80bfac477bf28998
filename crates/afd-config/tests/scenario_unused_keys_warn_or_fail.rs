//! Scenario: Unused config keys
//!
//! Validates:
//! 1) Unused keys are detected in WARN mode but do not error.
//! 2) Unused keys cause failure in FAIL mode.
//! 3) Keys under consumed prefixes are not flagged.
//! 4) Deterministic ordering of unused pointers.

use afd_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const YAML: &str = r#"
sync:
  concurrency: 2
  retries: 3
devices:
  - { id: 1, host: a, user: u, password_env: P }
zeta:
  foo: 1
alpha:
  bar: 2
"#;

#[test]
fn warn_mode_reports_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec![
            "/alpha/bar".to_string(),
            "/sync/retries".to_string(),
            "/zeta/foo".to_string()
        ]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err()
        .to_string();
    assert!(err.contains("CONFIG_UNUSED_KEYS"), "{err}");
    assert!(err.contains("3 unused"), "{err}");
}

#[test]
fn fully_consumed_config_is_clean() {
    let yaml = r#"
sync:
  max_chunk_len: 1500
  concurrency: 2
  state_path: "/var/lib/afd/nsr.json"
  request_timeout_secs: 10
  accept_invalid_certs: false
devices:
  - { id: 1, name: lobby, host: a, user: u, password_env: P }
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean());
    assert!(report.consumed_prefixes.contains(&"/devices".to_string()));
}
