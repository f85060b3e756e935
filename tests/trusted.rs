mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;

use tba_api::application::trusted::sign;

use common::{CONSUMER_ID, CREDENTIAL_ID, CREDENTIAL_SECRET, TestApp, body_json};

const UPDATE_PATH: &str = "/api/trusted/v1/event/2020ab/matches/update";

fn upload_body() -> Vec<u8> {
    serde_json::to_vec(&json!([{
        "comp_level": "qm",
        "set_number": 1,
        "match_number": 3,
        "alliances": {
            "red": {"teams": ["frc254", "frc4", "frc5"], "score": -1},
            "blue": {"teams": ["frc6", "frc7", "frc8"], "score": -1}
        }
    }]))
    .expect("json")
}

fn signed_post(path: &str, body: Vec<u8>, secret: &str) -> Request<Body> {
    let signature = sign(secret, path, &body).expect("signature");
    Request::builder()
        .method("POST")
        .uri(path)
        .header("x-tba-auth-id", CREDENTIAL_ID)
        .header("x-tba-auth-sig", signature)
        .body(Body::from(body))
        .expect("request")
}

fn read(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-tba-app-id", CONSUMER_ID)
        .body(Body::empty())
        .expect("request")
}

async fn error_message(response: axum::http::Response<Body>) -> String {
    body_json(response).await["Error"]
        .as_str()
        .expect("error message")
        .to_string()
}

#[tokio::test]
async fn signed_upload_is_stored_and_invalidates_cached_reads() {
    let app = TestApp::new().await;

    assert_eq!(
        app.send(read("/api/v2/event/2020ab/matches")).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        app.send(read("/api/v2/team/frc254/event/2020ab/matches"))
            .await
            .status(),
        StatusCode::OK
    );
    assert_eq!(app.store.len(), 2);

    let response = app
        .send(signed_post(UPDATE_PATH, upload_body(), CREDENTIAL_SECRET))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/json; charset=\"utf-8\"")
    );
    let summary = body_json(response).await;
    assert_eq!(summary["event_key"], json!("2020ab"));
    assert_eq!(summary["matches_written"], json!(1));
    assert_eq!(summary["cache_keys_invalidated"], json!(2));
    assert_eq!(app.store.len(), 0);
    assert_eq!(app.matches.count("2020ab").await, 3);

    let refreshed = body_json(app.send(read("/api/v2/team/frc254/event/2020ab/matches")).await).await;
    assert_eq!(refreshed.as_array().expect("array").len(), 2);
}

#[tokio::test]
async fn missing_auth_headers_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri(UPDATE_PATH)
                .body(Body::from(upload_body()))
                .expect("request"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "Must provide a request header parameter 'X-TBA-Auth-Id'"
    );
    assert_eq!(app.matches.count("2020ab").await, 2);
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .send(signed_post(UPDATE_PATH, upload_body(), "not-the-secret"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "Invalid X-TBA-Auth-Id and/or X-TBA-Auth-Sig!"
    );
    assert_eq!(app.matches.count("2020ab").await, 2);
}

#[tokio::test]
async fn signature_is_bound_to_the_request_path() {
    let app = TestApp::new().await;
    let body = upload_body();
    let signature = sign(
        CREDENTIAL_SECRET,
        "/api/trusted/v1/event/2020cd/matches/update",
        &body,
    )
    .expect("signature");

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri(UPDATE_PATH)
                .header("x-tba-auth-id", CREDENTIAL_ID)
                .header("x-tba-auth-sig", signature)
                .body(Body::from(body))
                .expect("request"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn credential_is_scoped_to_its_events() {
    let app = TestApp::new().await;

    let response = app
        .send(signed_post(
            "/api/trusted/v1/event/2020cd/matches/update",
            upload_body(),
            CREDENTIAL_SECRET,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "Only allowed to edit events: 2020ab"
    );
    assert_eq!(app.matches.count("2020cd").await, 0);
}

#[tokio::test]
async fn malformed_upload_is_rejected_with_parser_message() {
    let app = TestApp::new().await;

    let response = app
        .send(signed_post(
            UPDATE_PATH,
            b"<table></table>".to_vec(),
            CREDENTIAL_SECRET,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.starts_with("Invalid match JSON"));
    assert_eq!(app.matches.count("2020ab").await, 2);
}

#[tokio::test]
async fn overwriting_a_match_invalidates_teams_it_no_longer_lists() {
    let app = TestApp::new().await;
    let dropped_team = "/api/v2/team/frc254/event/2020ab/matches";

    let before = body_json(app.send(read(dropped_team)).await).await;
    assert_eq!(before.as_array().expect("array").len(), 1);
    assert_eq!(app.store.len(), 1);

    // qm1 previously had frc254 on red.
    let body = serde_json::to_vec(&json!([{
        "comp_level": "qm",
        "set_number": 1,
        "match_number": 1,
        "alliances": {
            "red": {"teams": ["frc9999", "frc971", "frc1678"], "score": 40},
            "blue": {"teams": ["frc1", "frc2", "frc3"], "score": 35}
        }
    }]))
    .expect("json");
    let response = app
        .send(signed_post(UPDATE_PATH, body, CREDENTIAL_SECRET))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let summary = body_json(response).await;
    assert_eq!(summary["matches_written"], json!(1));
    assert_eq!(summary["cache_keys_invalidated"], json!(1));
    assert_eq!(app.store.len(), 0);
    assert_eq!(app.matches.count("2020ab").await, 2);

    let after = body_json(app.send(read(dropped_team)).await).await;
    assert_eq!(after, json!([]));
}
