//! API integration tests.
//!
//! Drives the HTTP surface over the in-memory store, with an SMS sender that
//! records codes instead of sending them.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use ballot_api::{AppState, RateLimiterState, router as api_router};
use ballot_common::{
    AppResult, Config,
    config::{AdminConfig, DatabaseConfig, OtpConfig, ServerConfig, SessionConfig, SmsConfig},
};
use ballot_core::{SmsDelivery, SmsSender};
use ballot_db::test_utils::{MemoryStore, sample_student};
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";

#[derive(Default)]
struct RecordingSms {
    codes: Mutex<Vec<String>>,
}

impl RecordingSms {
    fn last_code(&self) -> String {
        self.codes.lock().unwrap().last().cloned().expect("no code sent")
    }
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send_otp(&self, _phone: &str, code: &str) -> AppResult<SmsDelivery> {
        self.codes.lock().unwrap().push(code.to_string());
        Ok(SmsDelivery::Sent)
    }
}

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            url: "postgres://localhost/ballot_test".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        sms: SmsConfig::default(),
        otp: OtpConfig::default(),
        session: SessionConfig {
            secret: "integration-secret".to_string(),
            ttl_secs: 1800,
        },
        admin: AdminConfig {
            token: ADMIN_TOKEN.to_string(),
        },
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    sms: Arc<RecordingSms>,
}

/// Build the app over a store holding one student and two categories.
async fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store
        .add_student(sample_student("01200644D", "0241234567"))
        .await;
    store.add_category(1, "President", 1).await;
    store.add_category(2, "Secretary", 2).await;
    store.add_candidate(10, "Kofi Boateng", 1).await;
    store.add_candidate(11, "Esi Owusu", 1).await;
    store.add_candidate(20, "Yaw Asante", 2).await;

    let sms = Arc::new(RecordingSms::default());
    let state = AppState::new(store.clone(), sms.clone(), &test_config()).unwrap();
    let router = api_router(RateLimiterState::new()).with_state(state);

    TestApp { router, store, sms }
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "198.51.100.7");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post(app: &TestApp, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let response = send(app, Method::POST, uri, token, Some(body)).await;
    let status = response.status();
    (status, json_body(response).await)
}

async fn get(app: &TestApp, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let response = send(app, Method::GET, uri, token, None).await;
    let status = response.status();
    (status, json_body(response).await)
}

fn token_of(body: &Value) -> String {
    body["data"]["token"].as_str().unwrap().to_string()
}

/// Walk the verification flow and return a voter session token.
async fn verify(app: &TestApp) -> String {
    let (_, body) = post(app, "/verification/start", None, json!({})).await;
    let token = token_of(&body);

    let (status, body) = post(
        app,
        "/verification/student-id",
        Some(&token),
        json!({ "studentId": "01200644D" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let token = token_of(&body);

    let (status, body) = post(
        app,
        "/verification/phone",
        Some(&token),
        json!({ "phone": "0241234567" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let token = token_of(&body);

    let (status, body) = post(
        app,
        "/verification/otp",
        Some(&token),
        json!({ "code": app.sms.last_code() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    token_of(&body)
}

#[tokio::test]
async fn test_verification_steps() {
    let app = create_test_app().await;

    let (status, body) = post(&app, "/verification/start", None, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"]["step"], "id-verification");
    let token = token_of(&body);

    let (status, body) = post(
        &app,
        "/verification/student-id",
        Some(&token),
        json!({ "studentId": " 01200644D " }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["state"]["step"], "phone-verification");
    assert_eq!(body["data"]["state"]["maskedPhone"], "024******7");
    let phone_token = token_of(&body);

    let (status, body) = post(
        &app,
        "/verification/phone",
        Some(&phone_token),
        json!({ "phone": "0209999999" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "Phone number does not match our records. Please check and try again."
    );

    let (status, body) = post(
        &app,
        "/verification/phone",
        Some(&phone_token),
        json!({ "phone": "024 123 4567" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Verification code sent to your phone number.");
    assert_eq!(body["data"]["state"]["step"], "sms-otp");
    assert_eq!(body["data"]["state"]["resendAfter"], 120);
    let otp_token = token_of(&body);

    let (status, body) = post(
        &app,
        "/verification/otp",
        Some(&otp_token),
        json!({ "code": "000000" }),
    )
    .await;
    // The recorded code is random; skip the mismatch check on the rare collision.
    if app.sms.last_code() != "000000" {
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Invalid or expired verification code. Please try again."
        );
    }

    let (status, body) = post(&app, "/verification/back", Some(&otp_token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"]["step"], "phone-verification");

    let (status, body) = post(
        &app,
        "/verification/otp",
        Some(&otp_token),
        json!({ "code": app.sms.last_code() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"]["step"], "verified");
    assert_eq!(body["data"]["state"]["name"], "Ama Mensah");
}

#[tokio::test]
async fn test_unknown_student_id() {
    let app = create_test_app().await;
    let (_, body) = post(&app, "/verification/start", None, json!({})).await;

    let (status, body) = post(
        &app,
        "/verification/student-id",
        Some(&token_of(&body)),
        json!({ "studentId": "99999999X" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        "Student ID not found. Please check your ID and try again."
    );
}

#[tokio::test]
async fn test_resend_inside_cooldown_is_rate_limited() {
    let app = create_test_app().await;
    let (_, body) = post(&app, "/verification/start", None, json!({})).await;
    let (_, body) = post(
        &app,
        "/verification/student-id",
        Some(&token_of(&body)),
        json!({ "studentId": "01200644D" }),
    )
    .await;
    let (_, body) = post(
        &app,
        "/verification/phone",
        Some(&token_of(&body)),
        json!({ "phone": "0241234567" }),
    )
    .await;

    let response = send(
        &app,
        Method::POST,
        "/verification/resend",
        Some(&token_of(&body)),
        Some(json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let body = json_body(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Please wait "), "{message}");
    assert!(message.ends_with(" seconds before requesting another OTP."));
}

#[tokio::test]
async fn test_flow_requires_token() {
    let app = create_test_app().await;

    let (status, body) = post(
        &app,
        "/verification/student-id",
        None,
        json!({ "studentId": "01200644D" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = post(
        &app,
        "/verification/student-id",
        Some("forged.deadbeef"),
        json!({ "studentId": "01200644D" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ballot_rejects_unverified_token() {
    let app = create_test_app().await;
    let (_, body) = post(&app, "/verification/start", None, json!({})).await;

    let (status, _) = get(&app, "/ballot", Some(&token_of(&body))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_voting_flow() {
    let app = create_test_app().await;
    let session = verify(&app).await;

    let (status, body) = get(&app, "/ballot", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["votingOpen"], true);
    assert_eq!(body["data"]["categories"].as_array().unwrap().len(), 2);

    let (status, body) = post(
        &app,
        "/ballot/votes",
        Some(&session),
        json!({ "candidateId": 10, "categoryId": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], false);

    let (status, body) = post(
        &app,
        "/ballot/votes",
        Some(&session),
        json!({ "candidateId": 11, "categoryId": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "You have already voted in this category.");

    let (status, body) = post(&app, "/ballot/finish", Some(&session), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Please vote in all categories before finishing."
    );

    let (status, body) = post(
        &app,
        "/ballot/votes",
        Some(&session),
        json!({ "candidateId": 10, "categoryId": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid candidate selection.");

    let (status, body) = post(
        &app,
        "/ballot/votes",
        Some(&session),
        json!({ "candidateId": 20, "categoryId": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["completed"], true);

    let (status, body) = get(&app, "/ballot/progress", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["votedCategories"], json!([1, 2]));

    let (status, body) = post(&app, "/ballot/finish", Some(&session), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["studentName"], "Ama Mensah");

    assert_eq!(app.store.all_votes().await.len(), 2);

    // A voter who has finished cannot start verification again.
    let (_, body) = post(&app, "/verification/start", None, json!({})).await;
    let (status, body) = post(
        &app,
        "/verification/student-id",
        Some(&token_of(&body)),
        json!({ "studentId": "01200644d" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "You have already voted in this election.");
}

#[tokio::test]
async fn test_student_details() {
    let app = create_test_app().await;
    let session = verify(&app).await;

    let (status, body) = post(
        &app,
        "/students/email-availability",
        Some(&session),
        json!({ "email": "ama@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email is available.");

    let (status, body) = post(
        &app,
        "/students/details",
        Some(&session),
        json!({ "email": "Ama@Example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["detailsCompleted"], true);

    let (status, body) = post(
        &app,
        "/students/details",
        Some(&session),
        json!({ "email": "other@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "You have already completed your details.");

    let (status, body) = get(&app, "/students/me", Some(&session)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["programme"], "Computer Science");
}

#[tokio::test]
async fn test_admin_requires_token() {
    let app = create_test_app().await;

    let (status, _) = get(&app, "/admin/results", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = get(&app, "/admin/results", Some("wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_closed_voting_blocks_votes() {
    let app = create_test_app().await;
    let session = verify(&app).await;

    let (status, body) = post(
        &app,
        "/admin/voting-status",
        Some(ADMIN_TOKEN),
        json!({ "isOpen": false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isOpen"], false);
    assert_eq!(body["data"]["version"], 1);

    let (status, body) = post(
        &app,
        "/ballot/votes",
        Some(&session),
        json!({ "candidateId": 10, "categoryId": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Voting is currently closed.");

    let (_, body) = post(
        &app,
        "/admin/voting-status",
        Some(ADMIN_TOKEN),
        json!({ "isOpen": true }),
    )
    .await;
    assert_eq!(body["data"]["version"], 2);

    let (status, _) = post(
        &app,
        "/ballot/votes",
        Some(&session),
        json!({ "candidateId": 10, "categoryId": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&app, "/admin/results", Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalStudents"], 1);
    assert_eq!(body["data"]["categories"][0]["candidates"][0]["votes"], 1);

    let (status, body) = get(&app, "/admin/turnout", Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["programmes"][0]["group"], "Computer Science");
}

#[tokio::test]
async fn test_verification_rate_limit_per_address() {
    let app = create_test_app().await;

    for _ in 0..10 {
        let (status, _) = post(&app, "/verification/start", None, json!({})).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = send(
        &app,
        Method::POST,
        "/verification/start",
        None,
        Some(json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // Ballot routes are not behind the address limiter.
    let (status, _) = get(&app, "/ballot", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_app().await;
    let response = send(&app, Method::GET, "/nonexistent", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
