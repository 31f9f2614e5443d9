//! Ballot endpoints.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use ballot_common::AppResult;
use ballot_core::{Ballot, BallotProgress, Confirmation, VoteReceipt};
use serde::Deserialize;

use crate::{extractors::Voter, middleware::AppState, response::ApiResponse};

/// Vote request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub candidate_id: i32,
    pub category_id: i32,
}

/// Categories and candidates.
async fn ballot(
    State(state): State<AppState>,
    Voter(_voter): Voter,
) -> AppResult<ApiResponse<Ballot>> {
    let ballot = state.ballot_service.ballot().await?;
    Ok(ApiResponse::ok(ballot))
}

/// Categories voted so far.
async fn progress(
    State(state): State<AppState>,
    Voter(voter): Voter,
) -> AppResult<ApiResponse<BallotProgress>> {
    let progress = state.ballot_service.progress(&voter.student_id).await?;
    Ok(ApiResponse::ok(progress))
}

/// Cast one vote.
async fn vote(
    State(state): State<AppState>,
    Voter(voter): Voter,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<VoteReceipt>> {
    let receipt = state
        .ballot_service
        .submit_vote(&voter.student_id, req.candidate_id, req.category_id)
        .await?;
    Ok(ApiResponse::with_message("Vote recorded.", receipt))
}

/// Finish a complete ballot.
async fn finish(
    State(state): State<AppState>,
    Voter(voter): Voter,
) -> AppResult<ApiResponse<Confirmation>> {
    let confirmation = state.ballot_service.finish(&voter.student_id).await?;
    Ok(ApiResponse::with_message(
        "Thank you for voting.",
        confirmation,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(ballot))
        .route("/progress", get(progress))
        .route("/votes", post(vote))
        .route("/finish", post(finish))
}
