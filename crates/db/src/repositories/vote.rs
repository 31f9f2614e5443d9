//! Vote repository.

use std::sync::Arc;

use crate::entities::{Vote, vote};
use ballot_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use serde::Serialize;

/// Outcome of inserting a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteInsert {
    /// Row written.
    Inserted(vote::Model),
    /// A vote for this (student, category) already exists.
    Duplicate,
}

/// Vote count for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct CandidateTally {
    /// Candidate ID.
    pub candidate_id: i32,
    /// Category the candidate stands in.
    pub category_id: i32,
    /// Number of votes received.
    pub votes: i64,
}

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Votes cast by a student, optionally restricted to one category,
    /// ordered by category.
    pub async fn find_by_student(
        &self,
        student_id: &str,
        category_id: Option<i32>,
    ) -> AppResult<Vec<vote::Model>> {
        let mut query = Vote::find().filter(vote::Column::StudentId.eq(student_id));
        if let Some(category_id) = category_id {
            query = query.filter(vote::Column::CategoryId.eq(category_id));
        }
        query
            .order_by_asc(vote::Column::CategoryId)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a vote. The unique index on (student_id, category_id) turns a
    /// concurrent duplicate into [`VoteInsert::Duplicate`].
    pub async fn create(&self, model: vote::Model) -> AppResult<VoteInsert> {
        let active = vote::ActiveModel {
            id: Set(model.id),
            student_id: Set(model.student_id),
            candidate_id: Set(model.candidate_id),
            category_id: Set(model.category_id),
            created_at: Set(model.created_at),
        };

        match active.insert(self.db.as_ref()).await {
            Ok(row) => Ok(VoteInsert::Inserted(row)),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(VoteInsert::Duplicate)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Votes grouped per candidate. Candidates without votes are absent.
    pub async fn tally(&self) -> AppResult<Vec<CandidateTally>> {
        Vote::find()
            .select_only()
            .column(vote::Column::CandidateId)
            .column(vote::Column::CategoryId)
            .column_as(vote::Column::Id.count(), "votes")
            .group_by(vote::Column::CandidateId)
            .group_by(vote::Column::CategoryId)
            .into_model::<CandidateTally>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
