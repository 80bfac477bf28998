//! afd-device
//!
//! Transport boundary for the time-clock devices.
//!
//! This crate knows how to talk to a clock (session login, AFD download,
//! roster export/import) and how to convert the clock's Windows-1252 bodies
//! to and from Rust strings. It knows nothing about resolution or merging;
//! AFD bodies are handed back as prepared punch lines ready for
//! `afd_reconcile::DeviceBatch`.

use std::fmt;

use afd_reconcile::DeviceId;

pub mod charset;
mod http;

pub use http::{HttpClientOptions, HttpDeviceClient};

// ---------------------------------------------------------------------------
// Endpoint + session
// ---------------------------------------------------------------------------

/// Where and how to reach one clock.
///
/// `password` is redacted in `Debug` output.
#[derive(Clone)]
pub struct DeviceEndpoint {
    pub device_id: DeviceId,
    /// Label for logs (configured name or host).
    pub label: String,
    /// Scheme + authority, no trailing slash (e.g. `https://172.18.5.241`).
    pub base_url: String,
    pub user: String,
    pub password: String,
}

impl DeviceEndpoint {
    /// Build an endpoint from a bare host. Clocks only serve HTTPS; a host
    /// that already carries a scheme is used as given.
    pub fn new(
        device_id: DeviceId,
        label: impl Into<String>,
        host: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let host = host.trim().trim_end_matches('/');
        let base_url = if host.starts_with("https://") || host.starts_with("http://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        Self {
            device_id,
            label: label.into(),
            base_url,
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceEndpoint")
            .field("device_id", &self.device_id)
            .field("label", &self.label)
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// An authenticated session on one clock. The token is opaque and redacted
/// in `Debug` output.
#[derive(Clone)]
pub struct Session {
    device_id: DeviceId,
    base_url: String,
    token: String,
}

impl Session {
    pub fn new(device_id: DeviceId, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            device_id,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.device_id)
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`DeviceClient`] may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Connection, TLS or timeout failure.
    Transport(String),
    /// The clock answered with a non-success HTTP status.
    Api { endpoint: &'static str, status: u16 },
    /// Login was refused or returned no session.
    Auth(String),
    /// A response body could not be decoded.
    Decode(String),
    /// An upload payload holds characters the clock's charset cannot carry.
    Encode(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Transport(msg) => write!(f, "transport error: {msg}"),
            DeviceError::Api { endpoint, status } => {
                write!(f, "device api error endpoint={endpoint} status={status}")
            }
            DeviceError::Auth(msg) => write!(f, "auth error: {msg}"),
            DeviceError::Decode(msg) => write!(f, "decode error: {msg}"),
            DeviceError::Encode(msg) => write!(f, "encode error: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Clock protocol contract.
///
/// Object-safe and `Send + Sync` so the orchestrator can share one
/// `Arc<dyn DeviceClient>` across concurrent per-device tasks.
#[async_trait::async_trait]
pub trait DeviceClient: Send + Sync {
    /// Open a session with the endpoint's credentials.
    async fn login(&self, endpoint: &DeviceEndpoint) -> Result<Session, DeviceError>;

    /// Close a session.
    async fn logout(&self, session: &Session) -> Result<(), DeviceError>;

    /// Download the attendance log starting at `initial_nsr` and return the
    /// prepared punch lines (footer dropped, non-punch records filtered).
    async fn fetch_afd(&self, session: &Session, initial_nsr: u64)
        -> Result<Vec<String>, DeviceError>;

    /// Export the roster as decoded CSV text (header line first).
    async fn export_roster(&self, session: &Session) -> Result<String, DeviceError>;

    /// Upload one roster payload (`header + "\n" + chunk`).
    async fn import_roster(&self, session: &Session, payload: &str) -> Result<(), DeviceError>;
}
