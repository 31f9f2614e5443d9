//! Voter verification endpoints.
//!
//! Every step takes the current flow token and answers with a freshly
//! signed one. A failed step leaves the caller's token untouched, so the
//! client simply retries with the token it already holds.

use axum::{Json, Router, extract::State, routing::post};
use ballot_common::AppResult;
use ballot_core::{Transition, VerificationEvent, VerificationState};
use serde::{Deserialize, Serialize};

use crate::{extractors::FlowToken, middleware::AppState, response::ApiResponse};

/// Token plus the state it encodes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowResponse {
    pub token: String,
    pub state: VerificationState,
}

/// Student ID request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentIdRequest {
    pub student_id: String,
}

/// Phone number request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneRequest {
    pub phone: String,
}

/// Verification code request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    pub code: String,
}

fn respond(state: &AppState, transition: Transition) -> AppResult<ApiResponse<FlowResponse>> {
    let token = state.signer.sign(&transition.state)?;
    let data = FlowResponse {
        token,
        state: transition.state,
    };
    Ok(match transition.message {
        Some(message) => ApiResponse::with_message(message, data),
        None => ApiResponse::ok(data),
    })
}

async fn advance(
    state: &AppState,
    current: &VerificationState,
    event: VerificationEvent,
) -> AppResult<ApiResponse<FlowResponse>> {
    let transition = state.flow.apply(current, event).await?;
    respond(state, transition)
}

/// Begin a new verification.
async fn start(State(state): State<AppState>) -> AppResult<ApiResponse<FlowResponse>> {
    respond(
        &state,
        Transition {
            state: VerificationState::IdVerification,
            message: None,
        },
    )
}

/// Submit a student ID.
async fn student_id(
    State(state): State<AppState>,
    FlowToken(current): FlowToken,
    Json(req): Json<StudentIdRequest>,
) -> AppResult<ApiResponse<FlowResponse>> {
    advance(&state, &current, VerificationEvent::SubmitStudentId(req.student_id)).await
}

/// Confirm the phone number on record and send a code.
async fn phone(
    State(state): State<AppState>,
    FlowToken(current): FlowToken,
    Json(req): Json<PhoneRequest>,
) -> AppResult<ApiResponse<FlowResponse>> {
    advance(&state, &current, VerificationEvent::SubmitPhone(req.phone)).await
}

/// Submit the code from the SMS.
async fn otp(
    State(state): State<AppState>,
    FlowToken(current): FlowToken,
    Json(req): Json<CodeRequest>,
) -> AppResult<ApiResponse<FlowResponse>> {
    advance(&state, &current, VerificationEvent::SubmitCode(req.code)).await
}

/// Send another code.
async fn resend(
    State(state): State<AppState>,
    FlowToken(current): FlowToken,
) -> AppResult<ApiResponse<FlowResponse>> {
    advance(&state, &current, VerificationEvent::Resend).await
}

/// Step back one screen.
async fn back(
    State(state): State<AppState>,
    FlowToken(current): FlowToken,
) -> AppResult<ApiResponse<FlowResponse>> {
    advance(&state, &current, VerificationEvent::Back).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/student-id", post(student_id))
        .route("/phone", post(phone))
        .route("/otp", post(otp))
        .route("/resend", post(resend))
        .route("/back", post(back))
}
