//! Device login credentials.
//!
//! # Contract
//! - Config YAML stores only env var NAMES (`password_env`).
//! - The binary calls [`resolve_device_credentials`] once at startup and hands
//!   the result to the device client. No other code reads the environment.
//! - `Debug` output redacts passwords.
//! - Error messages name the missing variable, never a value.

use afd_reconcile::DeviceId;
use anyhow::{bail, Result};

use crate::SyncConfig;

/// Login material for one device.
#[derive(Clone)]
pub struct DeviceCredentials {
    pub device_id: DeviceId,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("device_id", &self.device_id)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Resolve every configured device's password from the process environment.
///
/// # Errors
/// `SECRETS_MISSING` naming every variable that is unset or blank.
pub fn resolve_device_credentials(cfg: &SyncConfig) -> Result<Vec<DeviceCredentials>> {
    resolve_device_credentials_with(cfg, |name| std::env::var(name).ok())
}

/// Same as [`resolve_device_credentials`] with an injectable lookup.
pub fn resolve_device_credentials_with<F>(
    cfg: &SyncConfig,
    lookup: F,
) -> Result<Vec<DeviceCredentials>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = Vec::with_capacity(cfg.devices.len());
    let mut missing: Vec<&str> = Vec::new();

    for d in &cfg.devices {
        let var = d.password_env.trim();
        match lookup(var) {
            Some(v) if !v.trim().is_empty() => out.push(DeviceCredentials {
                device_id: d.id,
                user: d.user.clone(),
                password: v,
            }),
            _ => missing.push(var),
        }
    }

    if !missing.is_empty() {
        bail!(
            "SECRETS_MISSING: required env var(s) {:?} not set or empty",
            missing
        );
    }
    Ok(out)
}
