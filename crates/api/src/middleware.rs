//! Shared application state and request helpers.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use ballot_common::{AppError, AppResult, Config};
use ballot_core::{
    BallotService, OtpPolicy, OtpService, ResultsService, SessionSigner, SmsSender,
    StudentDetailsService, VerificationFlow, VotingGate,
};
use ballot_db::ElectionStore;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub flow: VerificationFlow,
    pub ballot_service: BallotService,
    pub details_service: StudentDetailsService,
    pub voting_gate: VotingGate,
    pub results_service: ResultsService,
    pub signer: SessionSigner,
    pub admin_token: Arc<str>,
}

impl AppState {
    /// Wire every service over one store and one SMS sender.
    pub fn new(
        store: Arc<dyn ElectionStore>,
        sms: Arc<dyn SmsSender>,
        config: &Config,
    ) -> AppResult<Self> {
        let signer = SessionSigner::from_config(&config.session)?;
        if config.admin.token.trim().is_empty() {
            return Err(AppError::Config("admin.token must be set".to_string()));
        }

        let gate = VotingGate::new(store.clone());
        let otp = OtpService::new(store.clone(), sms, OtpPolicy::from(&config.otp));

        Ok(Self {
            flow: VerificationFlow::new(store.clone(), otp),
            ballot_service: BallotService::new(store.clone(), gate.clone()),
            details_service: StudentDetailsService::new(store.clone()),
            voting_gate: gate,
            results_service: ResultsService::new(store),
            signer,
            admin_token: Arc::from(config.admin.token.as_str()),
        })
    }

    /// The OTP service, for background maintenance.
    #[must_use]
    pub const fn otp_service(&self) -> &OtpService {
        self.flow.otp()
    }
}

/// Token from an `Authorization: Bearer` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
