//! Scenario: Clock HTTP protocol against a mock device
//!
//! # Invariants under test
//!
//! 1. Login posts `{login, password}` and yields the returned session.
//! 2. 401 and a missing session are auth errors; other failures are API errors.
//! 3. AFD download posts `{initial_nsr}` with `session` and `mode=671`, decodes
//!    Windows-1252 and returns only punch lines.
//! 4. Roster export returns the decoded CSV text.
//! 5. Roster import posts an octet-stream body; unencodable payloads never
//!    reach the device.
//! 6. Logout passes the session.

use afd_device::{DeviceClient, DeviceEndpoint, DeviceError, HttpClientOptions, HttpDeviceClient};
use afd_reconcile::DeviceId;
use httpmock::prelude::*;
use serde_json::json;

fn client() -> HttpDeviceClient {
    HttpDeviceClient::new(HttpClientOptions::default()).unwrap()
}

fn endpoint(server: &MockServer) -> DeviceEndpoint {
    DeviceEndpoint::new(
        DeviceId::new(1).unwrap(),
        "lobby",
        &server.base_url(),
        "admin",
        "pw-1",
    )
}

async fn mock_login(server: &MockServer, token: &str) {
    let token = token.to_string();
    server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/login.fcgi")
                .json_body(json!({ "login": "admin", "password": "pw-1" }));
            then.status(200).json_body(json!({ "session": token }));
        })
        .await;
}

#[tokio::test]
async fn login_returns_session() {
    let server = MockServer::start_async().await;
    mock_login(&server, "sess-42").await;

    let session = client().login(&endpoint(&server)).await.unwrap();
    assert_eq!(session.device_id().get(), 1);
    assert_eq!(session.base_url(), server.base_url());
}

#[tokio::test]
async fn refused_login_is_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/login.fcgi");
            then.status(401);
        })
        .await;

    let err = client().login(&endpoint(&server)).await.unwrap_err();
    assert!(matches!(err, DeviceError::Auth(_)), "{err}");
    assert!(!err.to_string().contains("pw-1"), "password leaked: {err}");
}

#[tokio::test]
async fn login_without_session_is_auth_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/login.fcgi");
            then.status(200).json_body(json!({ "error": "invalid login" }));
        })
        .await;

    let err = client().login(&endpoint(&server)).await.unwrap_err();
    assert!(matches!(err, DeviceError::Auth(_)), "{err}");
}

#[tokio::test]
async fn server_error_is_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/login.fcgi");
            then.status(500);
        })
        .await;

    let err = client().login(&endpoint(&server)).await.unwrap_err();
    assert_eq!(
        err,
        DeviceError::Api {
            endpoint: "login.fcgi",
            status: 500
        }
    );
}

#[tokio::test]
async fn fetch_afd_requests_from_nsr_and_prepares_lines() {
    let server = MockServer::start_async().await;
    mock_login(&server, "sess-42").await;

    // Header record, one punch for a name with Ç (0xC7), footer.
    let mut body: Vec<u8> = Vec::new();
    body.extend_from_slice(b"0000000011HEADER-RECORD-PADDING-PADDING-PADDING\r\n");
    body.extend_from_slice(b"00000010252025-04-08T12:38:00-0300I080627000000CONCEI");
    body.push(0xC7);
    body.extend_from_slice(b"AO\r\n");
    body.extend_from_slice(b"AFD00012345.txt\r\n");

    let afd = server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/get_afd.fcgi")
                .query_param("session", "sess-42")
                .query_param("mode", "671")
                .json_body(json!({ "initial_nsr": 102 }));
            then.status(200).body(body);
        })
        .await;

    let c = client();
    let session = c.login(&endpoint(&server)).await.unwrap();
    let lines = c.fetch_afd(&session, 102).await.unwrap();

    afd.assert_async().await;
    assert_eq!(
        lines,
        vec!["00000010252025-04-08T12:38:00-0300I080627000000CONCEIÇAO".to_string()]
    );
}

#[tokio::test]
async fn empty_afd_body_is_no_lines() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/get_afd.fcgi");
            then.status(200).body("");
        })
        .await;

    let session = afd_device::Session::new(DeviceId::new(1).unwrap(), server.base_url(), "s");
    let lines = client().fetch_afd(&session, 1).await.unwrap();
    assert!(lines.is_empty());
}

#[tokio::test]
async fn export_roster_decodes_text() {
    let server = MockServer::start_async().await;
    let mut body: Vec<u8> = b"cpf;nome\r\n80627000000;JO".to_vec();
    body.push(0xC3);
    body.extend_from_slice(b"O\r\n");
    let export = server
        .mock_async(move |when, then| {
            when.method(POST)
                .path("/export_users_csv.fcgi")
                .query_param("session", "s-1")
                .query_param("mode", "671");
            then.status(200).body(body);
        })
        .await;

    let session = afd_device::Session::new(DeviceId::new(1).unwrap(), server.base_url(), "s-1");
    let text = client().export_roster(&session).await.unwrap();
    export.assert_async().await;
    assert_eq!(text, "cpf;nome\r\n80627000000;JOÃO\r\n");
}

#[tokio::test]
async fn import_roster_posts_octet_stream() {
    let server = MockServer::start_async().await;
    let import = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/import_users_csv.fcgi")
                .query_param("session", "s-1")
                .query_param("mode", "671")
                .header("content-type", "application/octet-stream")
                .body("cpf;nome\n80627000000;JANE");
            then.status(200);
        })
        .await;

    let session = afd_device::Session::new(DeviceId::new(1).unwrap(), server.base_url(), "s-1");
    client()
        .import_roster(&session, "cpf;nome\n80627000000;JANE")
        .await
        .unwrap();
    import.assert_async().await;
}

#[tokio::test]
async fn unencodable_payload_is_not_sent() {
    let server = MockServer::start_async().await;
    let import = server
        .mock_async(|when, then| {
            when.method(POST).path("/import_users_csv.fcgi");
            then.status(200);
        })
        .await;

    let session = afd_device::Session::new(DeviceId::new(1).unwrap(), server.base_url(), "s-1");
    let err = client()
        .import_roster(&session, "cpf;nome\n1;名前")
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::Encode(_)), "{err}");
    assert_eq!(import.hits_async().await, 0);
}

#[tokio::test]
async fn logout_passes_session() {
    let server = MockServer::start_async().await;
    let logout = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/logout.fcgi")
                .query_param("session", "s-9");
            then.status(200);
        })
        .await;

    let session = afd_device::Session::new(DeviceId::new(1).unwrap(), server.base_url(), "s-9");
    client().logout(&session).await.unwrap();
    logout.assert_async().await;
}

#[tokio::test]
async fn unreachable_device_is_transport_error() {
    // Port 9 (discard) on localhost is not served by anything in CI.
    let session = afd_device::Session::new(DeviceId::new(1).unwrap(), "http://127.0.0.1:9", "s");
    let err = client().export_roster(&session).await.unwrap_err();
    assert!(matches!(err, DeviceError::Transport(_)), "{err}");
}
