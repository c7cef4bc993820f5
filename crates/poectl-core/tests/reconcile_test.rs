#![allow(clippy::unwrap_used)]
// Integration tests for the reconciliation bracket using wiremock.

use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use poectl_core::{
    apply_desired_state, ControllerConfig, CoreError, Credentials, CsrfTokenHeader, DesiredState,
    TlsVerification,
};

const MAC: &str = "aabbccddeeff";
const DEVICE_ID: &str = "66a1b2c3d4e5f6a7b8c9d0e1";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ControllerConfig) {
    let server = MockServer::start().await;
    let config = ControllerConfig {
        url: Url::parse(&server.uri()).unwrap(),
        credentials: Credentials {
            username: "admin".into(),
            password: "hunter2".to_string().into(),
        },
        site: "default".into(),
        tls: TlsVerification::SystemDefaults,
        timeout: Duration::from_secs(5),
        csrf_header: CsrfTokenHeader::CsrfToken,
    };
    (server, config)
}

fn stat_path() -> String {
    format!("/proxy/network/api/s/default/stat/device/{MAC}")
}

fn rest_path() -> String {
    format!("/proxy/network/api/s/default/rest/device/{DEVICE_ID}")
}

fn device_envelope(overrides: &[Value]) -> Value {
    json!({
        "meta": { "rc": "ok" },
        "data": [{
            "device_id": DEVICE_ID,
            "mac": "aa:bb:cc:dd:ee:ff",
            "port_overrides": overrides,
        }]
    })
}

fn ok_envelope() -> Value {
    json!({ "meta": { "rc": "ok" }, "data": [] })
}

async fn mount_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-csrf-token", "tok")
                .set_body_json(json!({})),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

fn desired(ports: &[u16], mode: &str) -> DesiredState {
    DesiredState {
        ports: ports.iter().copied().collect::<BTreeSet<u16>>(),
        poe_mode: mode.into(),
    }
}

/// All PUT bodies the server saw, in order.
async fn put_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|req| req.method.to_string().eq_ignore_ascii_case("put"))
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .collect()
}

/// (method, path) pairs for every request the server saw, in order.
async fn request_log(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|req| (req.method.to_string().to_uppercase(), req.url.path().to_owned()))
        .collect()
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn test_reconcile_updates_only_targeted_ports() {
    let (server, config) = setup().await;
    mount_session(&server).await;

    let overrides = vec![
        json!({ "port_idx": 1, "poe_mode": "auto" }),
        json!({ "port_idx": 5, "poe_mode": "off" }),
        json!({ "port_idx": 7 }),
    ];

    Mock::given(method("GET"))
        .and(path(stat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_envelope(&overrides)))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(rest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .mount(&server)
        .await;

    let outcome = apply_desired_state(&config, MAC, &desired(&[5, 7], "auto"))
        .await
        .unwrap();

    assert_eq!(outcome.device_id, DEVICE_ID);
    assert_eq!(outcome.plan.changed, vec![5]);
    assert_eq!(outcome.plan.not_poe_capable, vec![7]);
    assert!(outcome.plan.missing.is_empty());

    let bodies = put_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let sent = bodies[0]["port_overrides"].as_array().unwrap();
    assert_eq!(sent[0], json!({ "port_idx": 1, "poe_mode": "auto" }));
    assert_eq!(sent[1], json!({ "port_idx": 5, "poe_mode": "auto" }));
    assert_eq!(sent[2], json!({ "port_idx": 7 }));
}

#[tokio::test]
async fn test_second_reconcile_sends_identical_body() {
    let (server, config) = setup().await;
    mount_session(&server).await;

    let original = vec![
        json!({ "port_idx": 2, "poe_mode": "auto" }),
        json!({ "port_idx": 3, "poe_mode": "auto", "name": "ap-attic" }),
    ];
    let patched = vec![
        json!({ "port_idx": 2, "poe_mode": "off" }),
        json!({ "port_idx": 3, "poe_mode": "off", "name": "ap-attic" }),
    ];

    // First fetch sees the original state, the second sees the state the
    // first update produced.
    Mock::given(method("GET"))
        .and(path(stat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_envelope(&original)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(stat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_envelope(&patched)))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(rest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .mount(&server)
        .await;

    let want = desired(&[2, 3], "off");
    let first = apply_desired_state(&config, MAC, &want).await.unwrap();
    let second = apply_desired_state(&config, MAC, &want).await.unwrap();

    assert_eq!(first.plan.changed, vec![2, 3]);
    assert!(second.plan.changed.is_empty());
    assert_eq!(second.plan.unchanged, vec![2, 3]);

    let bodies = put_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn test_untargeted_entries_survive_byte_for_byte() {
    let (server, config) = setup().await;
    mount_session(&server).await;

    // Deliberately odd key order and fields this tool knows nothing about.
    let untouched_raw = [
        r#"{"autoneg":true,"port_idx":1,"name":"uplink","full_duplex":true,"poe_mode":"auto"}"#,
        r#"{"port_idx":7,"stp_port_mode":false}"#,
    ];
    let overrides: Vec<Value> = untouched_raw
        .iter()
        .map(|raw| serde_json::from_str(raw).unwrap())
        .chain(std::iter::once(json!({ "port_idx": 4, "poe_mode": "auto" })))
        .collect();

    Mock::given(method("GET"))
        .and(path(stat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_envelope(&overrides)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(rest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .mount(&server)
        .await;

    apply_desired_state(&config, MAC, &desired(&[4], "off"))
        .await
        .unwrap();

    let bodies = put_bodies(&server).await;
    let sent = bodies[0]["port_overrides"].as_array().unwrap();
    assert_eq!(serde_json::to_string(&sent[0]).unwrap(), untouched_raw[0]);
    assert_eq!(serde_json::to_string(&sent[1]).unwrap(), untouched_raw[1]);
    assert_eq!(sent[2], json!({ "port_idx": 4, "poe_mode": "off" }));
}

#[tokio::test]
async fn test_missing_target_port_is_reported_not_fatal() {
    let (server, config) = setup().await;
    mount_session(&server).await;

    let overrides = vec![json!({ "port_idx": 5, "poe_mode": "auto" })];

    Mock::given(method("GET"))
        .and(path(stat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_envelope(&overrides)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(rest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .mount(&server)
        .await;

    let outcome = apply_desired_state(&config, MAC, &desired(&[5, 42], "off"))
        .await
        .unwrap();

    assert_eq!(outcome.plan.changed, vec![5]);
    assert_eq!(outcome.plan.missing, vec![42]);
    assert_eq!(put_bodies(&server).await.len(), 1);
}

// ── Bracket semantics ───────────────────────────────────────────────

#[tokio::test]
async fn test_auth_failure_aborts_before_device_contact() {
    let (server, config) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = apply_desired_state(&config, MAC, &desired(&[5], "off")).await;

    assert!(
        matches!(result, Err(CoreError::Auth(_))),
        "expected Auth error, got: {result:?}"
    );

    let log = request_log(&server).await;
    assert_eq!(log.len(), 1, "only the login attempt should hit the wire: {log:?}");
}

#[tokio::test]
async fn test_fetch_failure_still_logs_out() {
    let (server, config) = setup().await;
    mount_session(&server).await;

    Mock::given(method("GET"))
        .and(path(stat_path()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = apply_desired_state(&config, MAC, &desired(&[5], "off")).await;

    assert!(
        matches!(result, Err(CoreError::Fetch(_))),
        "expected Fetch error, got: {result:?}"
    );

    let log = request_log(&server).await;
    assert!(
        log.iter().any(|(m, p)| m == "POST" && p == "/api/auth/logout"),
        "logout must still be attempted: {log:?}"
    );
    assert!(put_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn test_update_failure_still_logs_out() {
    let (server, config) = setup().await;
    mount_session(&server).await;

    let overrides = vec![json!({ "port_idx": 5, "poe_mode": "auto" })];

    Mock::given(method("GET"))
        .and(path(stat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_envelope(&overrides)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(rest_path()))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = apply_desired_state(&config, MAC, &desired(&[5], "off")).await;

    assert!(
        matches!(result, Err(CoreError::Update(_))),
        "expected Update error, got: {result:?}"
    );

    let log = request_log(&server).await;
    assert!(
        log.iter().any(|(m, p)| m == "POST" && p == "/api/auth/logout"),
        "logout must still be attempted: {log:?}"
    );
}

#[tokio::test]
async fn test_logout_failure_does_not_fail_the_bracket() {
    let (server, config) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-csrf-token", "tok")
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let overrides = vec![json!({ "port_idx": 5, "poe_mode": "auto" })];
    Mock::given(method("GET"))
        .and(path(stat_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_envelope(&overrides)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(rest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .mount(&server)
        .await;

    let outcome = apply_desired_state(&config, MAC, &desired(&[5], "off")).await;

    assert!(outcome.is_ok(), "logout is best-effort cleanup: {outcome:?}");
}
