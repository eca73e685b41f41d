//! # Export Over HTTP, Verify Offline
//!
//! A tenant official downloads the audit bundle from the HTTP service and
//! checks it with `agora-verify`, before and after tampering.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use agora_api::state::{AppConfig, AppState};
use agora_cli::{run_verify, EXIT_INVALID, EXIT_UNREADABLE, EXIT_VALID};

const OFFICIAL: &str = "Bearer official:annecy:clerk-7:s3cret";

fn app() -> Router {
    let config = AppConfig {
        auth_token: Some("s3cret".into()),
        ..AppConfig::default()
    };
    agora_api::app(AppState::with_config(config))
}

async fn request(app: &Router, method: &str, uri: &str, auth: &str, body: Option<Value>) -> (StatusCode, String) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Run a poll through its lifecycle and return the exported JSON bundle.
async fn exported_bundle() -> String {
    let app = app();
    let (status, body) = request(
        &app,
        "POST",
        "/v1/polls",
        OFFICIAL,
        Some(json!({
            "id": "P-lake",
            "title": "Swimming area at the lake",
            "options": [{ "id": "yes", "text": "Yes" }, { "id": "no", "text": "No" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    request(&app, "POST", "/v1/polls/P-lake/open", OFFICIAL, None).await;
    request(
        &app,
        "POST",
        "/v1/polls/P-lake/votes",
        "Bearer citizen:annecy:resident-1:s3cret",
        Some(json!({ "option_id": "yes" })),
    )
    .await;
    request(&app, "POST", "/v1/polls/P-lake/close", OFFICIAL, None).await;

    let (status, bundle) = request(&app, "GET", "/v1/audit/export?format=json", OFFICIAL, None).await;
    assert_eq!(status, StatusCode::OK);
    bundle
}

fn verify_text(contents: &str) -> (u8, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit-annecy.json");
    std::fs::write(&path, contents).unwrap();
    let mut out = Vec::new();
    let code = run_verify(&path, false, &mut out).unwrap();
    (code, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn http_export_verifies_offline() {
    let bundle = exported_bundle().await;
    let (code, report) = verify_text(&bundle);
    assert_eq!(code, EXIT_VALID, "{report}");
    assert!(report.contains("tenant:       annecy"));
    assert!(report.contains("events checked: 3"));
}

#[tokio::test]
async fn tampered_export_fails_offline() {
    let bundle = exported_bundle().await;
    let mut doc: Value = serde_json::from_str(&bundle).unwrap();
    doc["events"][0]["payload"]["title"] = json!("Swimming ban at the lake");

    let (code, report) = verify_text(&doc.to_string());
    assert_eq!(code, EXIT_INVALID);
    assert!(report.contains("INVALID: chain broken at event index 0"), "{report}");
}

#[test]
fn unreadable_input_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();
    assert_eq!(
        run_verify(&dir.path().join("nowhere.json"), false, &mut out).unwrap(),
        EXIT_UNREADABLE
    );
    assert_eq!(verify_text("<html>").0, EXIT_UNREADABLE);
}
