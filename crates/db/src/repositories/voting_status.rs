//! Voting status repository.

use std::sync::Arc;

use crate::entities::{VotingStatus, voting_status};
use ballot_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use voting_status::VOTING_STATUS_ID;

/// Voting status repository for database operations.
#[derive(Clone)]
pub struct VotingStatusRepository {
    db: Arc<DatabaseConnection>,
}

impl VotingStatusRepository {
    /// Create a new voting status repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Read the status row, if seeded.
    pub async fn find(&self) -> AppResult<Option<voting_status::Model>> {
        VotingStatus::find_by_id(VOTING_STATUS_ID)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set the flag and bump the version, creating the row if missing.
    pub async fn set_open(&self, is_open: bool) -> AppResult<voting_status::Model> {
        let now = Utc::now();
        let result = VotingStatus::update_many()
            .col_expr(voting_status::Column::IsOpen, Expr::value(is_open))
            .col_expr(
                voting_status::Column::Version,
                Expr::col(voting_status::Column::Version).add(1),
            )
            .col_expr(voting_status::Column::UpdatedAt, Expr::value(now))
            .filter(voting_status::Column::Id.eq(VOTING_STATUS_ID))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            let row = voting_status::ActiveModel {
                id: Set(VOTING_STATUS_ID),
                is_open: Set(is_open),
                version: Set(1),
                updated_at: Set(now.into()),
            };
            return row
                .insert(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()));
        }

        self.find()
            .await?
            .ok_or_else(|| AppError::Internal("Voting status row vanished".to_string()))
    }
}
