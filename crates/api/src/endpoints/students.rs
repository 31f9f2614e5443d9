//! Student detail endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use ballot_common::AppResult;
use ballot_core::StudentProfile;
use ballot_core::student_details::EMAIL_AVAILABLE;
use serde::Deserialize;
use validator::Validate;

use crate::{extractors::Voter, middleware::AppState, response::ApiResponse};

/// Email request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
}

/// Check whether an email address is still free.
async fn email_availability(
    State(state): State<AppState>,
    Voter(_voter): Voter,
    Json(req): Json<EmailRequest>,
) -> AppResult<ApiResponse<()>> {
    req.validate()?;
    state.details_service.check_email_available(&req.email).await?;
    Ok(ApiResponse::message(EMAIL_AVAILABLE))
}

/// Record the voter's email.
async fn save_details(
    State(state): State<AppState>,
    Voter(voter): Voter,
    Json(req): Json<EmailRequest>,
) -> AppResult<ApiResponse<StudentProfile>> {
    req.validate()?;
    state
        .details_service
        .save_details(&voter.student_id, &req.email)
        .await?;
    let profile = state.details_service.profile(&voter.student_id).await?;
    Ok(ApiResponse::with_message("Your details have been saved.", profile))
}

/// The signed-in voter's profile.
async fn me(
    State(state): State<AppState>,
    Voter(voter): Voter,
) -> AppResult<ApiResponse<StudentProfile>> {
    let profile = state.details_service.profile(&voter.student_id).await?;
    Ok(ApiResponse::ok(profile))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/email-availability", post(email_availability))
        .route("/details", post(save_details))
        .route("/me", get(me))
}
