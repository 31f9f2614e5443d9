//! Voting gate.
//!
//! The flag is read from the store on every call and never cached, so a
//! toggle takes effect on the next request.

use std::sync::Arc;

use ballot_common::{AppError, AppResult};
use ballot_db::ElectionStore;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const VOTING_CLOSED: &str = "Voting is currently closed.";

/// Current gate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStatusView {
    pub is_open: bool,
    pub version: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reads and toggles the voting-open flag.
#[derive(Clone)]
pub struct VotingGate {
    store: Arc<dyn ElectionStore>,
}

impl VotingGate {
    /// Create a new voting gate.
    #[must_use]
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }

    /// Current state. A missing row reads as closed.
    pub async fn status(&self) -> AppResult<VotingStatusView> {
        Ok(match self.store.voting_status().await? {
            Some(row) => VotingStatusView {
                is_open: row.is_open,
                version: row.version,
                updated_at: Some(row.updated_at.with_timezone(&Utc)),
            },
            None => VotingStatusView {
                is_open: false,
                version: 0,
                updated_at: None,
            },
        })
    }

    /// Whether votes may be submitted right now.
    pub async fn is_open(&self) -> AppResult<bool> {
        Ok(self.status().await?.is_open)
    }

    /// Fail with `Forbidden` unless voting is open.
    pub async fn ensure_open(&self) -> AppResult<()> {
        if self.is_open().await? {
            Ok(())
        } else {
            Err(AppError::Forbidden(VOTING_CLOSED.to_string()))
        }
    }

    /// Open or close voting.
    pub async fn set_open(&self, is_open: bool) -> AppResult<VotingStatusView> {
        let row = self.store.set_voting_open(is_open).await?;
        tracing::info!(is_open, version = row.version, "Voting status changed");
        Ok(VotingStatusView {
            is_open: row.is_open,
            version: row.version,
            updated_at: Some(row.updated_at.with_timezone(&Utc)),
        })
    }
}
