//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use ballot_common::AppError;
use ballot_core::{VerificationState, VerifiedVoter};
use sha2::{Digest, Sha256};

use crate::middleware::{AppState, bearer_token};

/// Verification state carried by a signed flow token.
#[derive(Debug, Clone)]
pub struct FlowToken(pub VerificationState);

impl FromRequestParts<AppState> for FlowToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        state.signer.verify(token).map(Self)
    }
}

/// A voter who has completed verification.
#[derive(Debug, Clone)]
pub struct Voter(pub VerifiedVoter);

impl FromRequestParts<AppState> for Voter {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        state.signer.verify_voter(token).map(Self)
    }
}

/// Caller presenting the configured administrator token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        // Compare digests so the comparison time does not depend on the prefix.
        let presented = Sha256::digest(token.as_bytes());
        let expected = Sha256::digest(state.admin_token.as_bytes());
        if presented == expected {
            Ok(Self)
        } else {
            tracing::warn!("Rejected admin request with an invalid token");
            Err(AppError::Forbidden("Invalid credentials".to_string()))
        }
    }
}
