use std::time::Duration;

use afd_reconcile::prepare_log_lines;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{charset, DeviceClient, DeviceEndpoint, DeviceError, Session};

/// Mode flag the clock firmware expects on every data endpoint.
const MODE: &str = "671";

const LOGIN: &str = "login.fcgi";
const LOGOUT: &str = "logout.fcgi";
const GET_AFD: &str = "get_afd.fcgi";
const EXPORT_USERS: &str = "export_users_csv.fcgi";
const IMPORT_USERS: &str = "import_users_csv.fcgi";

#[derive(Debug, Clone, Copy)]
pub struct HttpClientOptions {
    pub timeout: Duration,
    /// Clocks ship self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            accept_invalid_certs: true,
        }
    }
}

/// `reqwest`-backed [`DeviceClient`].
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    http: reqwest::Client,
}

impl HttpDeviceClient {
    pub fn new(opts: HttpClientOptions) -> Result<Self, DeviceError> {
        let http = reqwest::Client::builder()
            .timeout(opts.timeout)
            .danger_accept_invalid_certs(opts.accept_invalid_certs)
            .build()
            .map_err(|e| DeviceError::Transport(format!("http client build failed: {e}")))?;
        Ok(Self { http })
    }

    fn url(base_url: &str, endpoint: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
    }

    fn session_post(&self, session: &Session, endpoint: &'static str) -> reqwest::RequestBuilder {
        self.http
            .post(Self::url(session.base_url(), endpoint))
            .query(&[("session", session.token()), ("mode", MODE)])
    }

    async fn send(
        endpoint: &'static str,
        req: reqwest::RequestBuilder,
    ) -> Result<Response, DeviceError> {
        let resp = req
            .send()
            .await
            .map_err(|e| DeviceError::Transport(format!("{endpoint}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DeviceError::Api {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    async fn body_text(endpoint: &'static str, resp: Response) -> Result<String, DeviceError> {
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DeviceError::Transport(format!("{endpoint} body: {e}")))?;
        Ok(charset::decode(&bytes))
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    session: Option<String>,
}

#[derive(Serialize)]
struct AfdRequest {
    initial_nsr: u64,
}

#[async_trait::async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn login(&self, endpoint: &DeviceEndpoint) -> Result<Session, DeviceError> {
        let req = self
            .http
            .post(Self::url(&endpoint.base_url, LOGIN))
            .json(&LoginRequest {
                login: &endpoint.user,
                password: &endpoint.password,
            });

        let resp = match Self::send(LOGIN, req).await {
            Err(DeviceError::Api { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16()
                    || status == StatusCode::FORBIDDEN.as_u16() =>
            {
                return Err(DeviceError::Auth(format!(
                    "device {} refused login for user {} (status {status})",
                    endpoint.device_id, endpoint.user
                )));
            }
            other => other?,
        };

        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| DeviceError::Decode(format!("{LOGIN} response: {e}")))?;

        match body.session.filter(|s| !s.trim().is_empty()) {
            Some(token) => {
                debug!(device_id = %endpoint.device_id, "session opened");
                Ok(Session::new(endpoint.device_id, endpoint.base_url.clone(), token))
            }
            None => Err(DeviceError::Auth(format!(
                "device {} returned no session",
                endpoint.device_id
            ))),
        }
    }

    async fn logout(&self, session: &Session) -> Result<(), DeviceError> {
        let req = self
            .http
            .post(Self::url(session.base_url(), LOGOUT))
            .query(&[("session", session.token())]);
        Self::send(LOGOUT, req).await?;
        debug!(device_id = %session.device_id(), "session closed");
        Ok(())
    }

    async fn fetch_afd(
        &self,
        session: &Session,
        initial_nsr: u64,
    ) -> Result<Vec<String>, DeviceError> {
        let req = self
            .session_post(session, GET_AFD)
            .json(&AfdRequest { initial_nsr });
        let resp = Self::send(GET_AFD, req).await?;
        let text = Self::body_text(GET_AFD, resp).await?;
        let lines = prepare_log_lines(&text);
        debug!(
            device_id = %session.device_id(),
            initial_nsr,
            bytes = text.len(),
            punch_lines = lines.len(),
            "afd downloaded"
        );
        Ok(lines)
    }

    async fn export_roster(&self, session: &Session) -> Result<String, DeviceError> {
        let resp = Self::send(EXPORT_USERS, self.session_post(session, EXPORT_USERS)).await?;
        let text = Self::body_text(EXPORT_USERS, resp).await?;
        debug!(device_id = %session.device_id(), bytes = text.len(), "roster exported");
        Ok(text)
    }

    async fn import_roster(&self, session: &Session, payload: &str) -> Result<(), DeviceError> {
        let body = charset::encode(payload)?;
        let len = body.len();
        let req = self
            .session_post(session, IMPORT_USERS)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body);
        Self::send(IMPORT_USERS, req).await?;
        debug!(device_id = %session.device_id(), bytes = len, "roster chunk imported");
        Ok(())
    }
}
