//! Voting category and candidate repositories.

use std::sync::Arc;

use crate::entities::{Candidate, VotingCategory, candidate, voting_category};
use ballot_common::{AppError, AppResult};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};

/// Voting category repository for database operations.
#[derive(Clone)]
pub struct VotingCategoryRepository {
    db: Arc<DatabaseConnection>,
}

impl VotingCategoryRepository {
    /// Create a new voting category repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All categories in display order.
    pub async fn find_all_ordered(&self) -> AppResult<Vec<voting_category::Model>> {
        VotingCategory::find()
            .order_by_asc(voting_category::Column::DisplayOrder)
            .order_by_asc(voting_category::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Candidate repository for database operations.
#[derive(Clone)]
pub struct CandidateRepository {
    db: Arc<DatabaseConnection>,
}

impl CandidateRepository {
    /// Create a new candidate repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All candidates ordered by ID.
    pub async fn find_all(&self) -> AppResult<Vec<candidate::Model>> {
        Candidate::find()
            .order_by_asc(candidate::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a candidate by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<candidate::Model>> {
        Candidate::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
