//! Student and student details repositories.

use std::sync::Arc;

use crate::entities::{Student, StudentDetails, student, student_details};
use ballot_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
    sea_query::{Expr, Func},
};

/// Outcome of inserting a student details row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailsInsert {
    /// Row written.
    Inserted(student_details::Model),
    /// Another student already uses this email.
    EmailTaken,
    /// Details already exist for this student.
    AlreadyCompleted,
}

/// Student repository for database operations.
#[derive(Clone)]
pub struct StudentRepository {
    db: Arc<DatabaseConnection>,
}

impl StudentRepository {
    /// Create a new student repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a student by ID. Matching ignores case.
    pub async fn find_by_id(&self, student_id: &str) -> AppResult<Option<student::Model>> {
        Student::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(student::Column::StudentId)))
                    .eq(student_id.trim().to_lowercase()),
            )
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List every student.
    pub async fn find_all(&self) -> AppResult<Vec<student::Model>> {
        Student::find()
            .order_by_asc(student::Column::StudentId)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Set `has_voted = true`. Returns whether a row matched.
    pub async fn mark_voted(&self, student_id: &str) -> AppResult<bool> {
        let result = Student::update_many()
            .col_expr(student::Column::HasVoted, Expr::value(true))
            .filter(student::Column::StudentId.eq(student_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }
}

/// Student details repository for database operations.
#[derive(Clone)]
pub struct StudentDetailsRepository {
    db: Arc<DatabaseConnection>,
}

impl StudentDetailsRepository {
    /// Create a new student details repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find details by student ID.
    pub async fn find_by_student_id(
        &self,
        student_id: &str,
    ) -> AppResult<Option<student_details::Model>> {
        StudentDetails::find_by_id(student_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether an email is already recorded.
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let count = StudentDetails::find()
            .filter(student_details::Column::Email.eq(email))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Insert details, classifying unique violations.
    pub async fn create(&self, model: student_details::Model) -> AppResult<DetailsInsert> {
        let active = student_details::ActiveModel {
            student_id: Set(model.student_id),
            name: Set(model.name),
            phone: Set(model.phone),
            email: Set(model.email),
            programme: Set(model.programme),
            level: Set(model.level),
            created_at: Set(model.created_at),
        };

        match active.insert(self.db.as_ref()).await {
            Ok(row) => Ok(DetailsInsert::Inserted(row)),
            Err(e) => classify_details_error(e),
        }
    }
}

fn classify_details_error(err: DbErr) -> AppResult<DetailsInsert> {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
            Ok(DetailsInsert::EmailTaken)
        }
        Some(SqlErr::UniqueConstraintViolation(_)) => Ok(DetailsInsert::AlreadyCompleted),
        _ => Err(AppError::Database(err.to_string())),
    }
}
