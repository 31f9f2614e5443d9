//! Signed verification tokens.
//!
//! The HTTP layer keeps no server-side sessions. The current
//! [`VerificationState`] travels with the client as
//! `base64url(json) "." hex(hmac-sha256)`, and a token holding
//! [`VerificationState::Verified`] is the voter session.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ballot_common::{AppError, AppResult, config::SessionConfig};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::verification::VerificationState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize, Deserialize)]
struct Claims {
    state: VerificationState,
    issued_at: i64,
}

/// A voter who completed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedVoter {
    pub student_id: String,
    pub name: String,
}

/// Signs and checks verification tokens.
#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl SessionSigner {
    /// Create a signer. The secret must not be empty.
    pub fn new(secret: &str, ttl_secs: i64) -> AppResult<Self> {
        if secret.trim().is_empty() {
            return Err(AppError::Config("session.secret must be set".to_string()));
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
            ttl_secs,
        })
    }

    /// Create a signer from configuration.
    pub fn from_config(config: &SessionConfig) -> AppResult<Self> {
        Self::new(&config.secret, config.ttl_secs)
    }

    /// Token lifetime in seconds.
    #[must_use]
    pub const fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Sign a state.
    pub fn sign(&self, state: &VerificationState) -> AppResult<String> {
        self.sign_at(state, Utc::now().timestamp())
    }

    fn sign_at(&self, state: &VerificationState, issued_at: i64) -> AppResult<String> {
        let claims = Claims {
            state: state.clone(),
            issued_at,
        };
        let json = serde_json::to_vec(&claims)
            .map_err(|e| AppError::Internal(format!("Failed to encode session: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Check a token and return its state.
    pub fn verify(&self, token: &str) -> AppResult<VerificationState> {
        let (payload, signature) = token.split_once('.').ok_or(AppError::Unauthorized)?;
        let signature = hex::decode(signature).map_err(|_| AppError::Unauthorized)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AppError::Unauthorized)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AppError::Unauthorized)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| AppError::Unauthorized)?;

        let age = Utc::now().timestamp() - claims.issued_at;
        if age > self.ttl_secs || age < -60 {
            tracing::debug!(age, "Rejected expired session token");
            return Err(AppError::Unauthorized);
        }

        Ok(claims.state)
    }

    /// Check a voter session token.
    pub fn verify_voter(&self, token: &str) -> AppResult<VerifiedVoter> {
        match self.verify(token)? {
            VerificationState::Verified { student_id, name } => {
                Ok(VerifiedVoter { student_id, name })
            }
            _ => Err(AppError::Unauthorized),
        }
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AppError::Internal(format!("Invalid session key: {e}")))
    }
}
