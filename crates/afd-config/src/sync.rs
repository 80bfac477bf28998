use std::collections::BTreeSet;

use afd_reconcile::{DeviceId, DEFAULT_MAX_CHUNK_LEN};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_CONCURRENCY: usize = 1;
const DEFAULT_STATE_PATH: &str = "nsr.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// `sync:` section. Every key is optional. Stray keys are reported by the
/// unused-key lint rather than rejected here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Upper bound (characters) on one roster upload chunk.
    #[serde(default = "default_max_chunk_len")]
    pub max_chunk_len: usize,
    /// Device operations allowed in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Watermark store location.
    #[serde(default = "default_state_path")]
    pub state_path: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Clocks ship self-signed certificates.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_chunk_len: default_max_chunk_len(),
            concurrency: default_concurrency(),
            state_path: default_state_path(),
            request_timeout_secs: default_request_timeout_secs(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

fn default_max_chunk_len() -> usize {
    DEFAULT_MAX_CHUNK_LEN
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_state_path() -> String {
    DEFAULT_STATE_PATH.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_accept_invalid_certs() -> bool {
    true
}

/// One entry under `devices:`.
///
/// `password_env` is the NAME of the environment variable holding the login
/// password. The value is read once at startup by
/// [`crate::credentials::resolve_device_credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub id: DeviceId,
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    pub user: String,
    pub password_env: String,
}

impl DeviceConfig {
    /// Human label for logs: the configured name, else the host.
    pub fn label(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => self.host.as_str(),
        }
    }
}

/// Typed view of the merged configuration.
///
/// Device order is significant: it is the canonical encounter order used to
/// break exact timestamp ties during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl SyncConfig {
    /// Deserialize and validate. Unknown top-level keys are left to
    /// [`crate::report_unused_keys`].
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let cfg: SyncConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the sync schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            bail!("CONFIG_INVALID: at least one device is required under /devices");
        }
        if self.sync.max_chunk_len < 1 {
            bail!("CONFIG_INVALID: /sync/max_chunk_len must be >= 1");
        }
        if self.sync.concurrency < 1 {
            bail!("CONFIG_INVALID: /sync/concurrency must be >= 1");
        }
        if self.sync.request_timeout_secs < 1 {
            bail!("CONFIG_INVALID: /sync/request_timeout_secs must be >= 1");
        }
        if self.sync.state_path.trim().is_empty() {
            bail!("CONFIG_INVALID: /sync/state_path must not be blank");
        }

        let mut seen = BTreeSet::new();
        for (i, d) in self.devices.iter().enumerate() {
            if !seen.insert(d.id) {
                bail!("CONFIG_INVALID: duplicate device id {} at /devices/{}", d.id, i);
            }
            if d.host.trim().is_empty() {
                bail!("CONFIG_INVALID: /devices/{}/host must not be blank", i);
            }
            if d.user.trim().is_empty() {
                bail!("CONFIG_INVALID: /devices/{}/user must not be blank", i);
            }
            if d.password_env.trim().is_empty() {
                bail!("CONFIG_INVALID: /devices/{}/password_env must not be blank", i);
            }
        }
        Ok(())
    }

    /// Device ids in configuration order.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.id).collect()
    }

    pub fn device(&self, id: DeviceId) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_host() {
        let mut d = DeviceConfig {
            id: DeviceId::new(1).unwrap(),
            name: None,
            host: "10.0.0.1".to_string(),
            user: "admin".to_string(),
            password_env: "P".to_string(),
        };
        assert_eq!(d.label(), "10.0.0.1");
        d.name = Some("  ".to_string());
        assert_eq!(d.label(), "10.0.0.1");
        d.name = Some("lobby".to_string());
        assert_eq!(d.label(), "lobby");
    }

    #[test]
    fn settings_default_matches_empty_section() {
        let parsed: SyncSettings = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(parsed, SyncSettings::default());
        assert_eq!(parsed.max_chunk_len, 2000);
        assert_eq!(parsed.concurrency, 1);
        assert!(parsed.accept_invalid_certs);
    }
}
