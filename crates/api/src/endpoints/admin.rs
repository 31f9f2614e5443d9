//! Administrator endpoints.

use axum::{Json, Router, extract::State, routing::get};
use ballot_common::AppResult;
use ballot_core::{Dashboard, TurnoutBreakdown, VotingStatusView};
use serde::Deserialize;

use crate::{extractors::AdminAuth, middleware::AppState, response::ApiResponse};

/// Voting status update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStatusRequest {
    pub is_open: bool,
}

/// Current voting status.
async fn voting_status(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<VotingStatusView>> {
    let status = state.voting_gate.status().await?;
    Ok(ApiResponse::ok(status))
}

/// Open or close voting.
async fn set_voting_status(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<VotingStatusRequest>,
) -> AppResult<ApiResponse<VotingStatusView>> {
    let status = state.voting_gate.set_open(req.is_open).await?;
    let message = if status.is_open {
        "Voting is now open."
    } else {
        "Voting is now closed."
    };
    Ok(ApiResponse::with_message(message, status))
}

/// Turnout and per-category tallies.
async fn results(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Dashboard>> {
    let dashboard = state.results_service.dashboard().await?;
    Ok(ApiResponse::ok(dashboard))
}

/// Turnout grouped by programme and level.
async fn turnout(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<TurnoutBreakdown>> {
    let breakdown = state.results_service.turnout_breakdown().await?;
    Ok(ApiResponse::ok(breakdown))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/voting-status", get(voting_status).post(set_voting_status))
        .route("/results", get(results))
        .route("/turnout", get(turnout))
}
