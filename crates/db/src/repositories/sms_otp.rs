//! SMS one-time code repository.

use std::sync::Arc;

use crate::entities::{SmsOtp, sms_otp};
use ballot_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::Expr,
};

/// One-time code repository for database operations.
#[derive(Clone)]
pub struct SmsOtpRepository {
    db: Arc<DatabaseConnection>,
}

impl SmsOtpRepository {
    /// Create a new one-time code repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Mark every unused code for a student as used.
    pub async fn invalidate_unused(&self, student_id: &str) -> AppResult<u64> {
        let result = SmsOtp::update_many()
            .col_expr(sms_otp::Column::Used, Expr::value(true))
            .filter(sms_otp::Column::StudentId.eq(student_id))
            .filter(sms_otp::Column::Used.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Codes issued to a student after `since`, newest first.
    pub async fn find_since(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<sms_otp::Model>> {
        SmsOtp::find()
            .filter(sms_otp::Column::StudentId.eq(student_id))
            .filter(sms_otp::Column::CreatedAt.gt(since))
            .order_by_desc(sms_otp::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a newly issued code.
    pub async fn create(&self, model: sms_otp::Model) -> AppResult<sms_otp::Model> {
        let active = sms_otp::ActiveModel {
            id: Set(model.id),
            student_id: Set(model.student_id),
            phone: Set(model.phone),
            otp_code: Set(model.otp_code),
            created_at: Set(model.created_at),
            expires_at: Set(model.expires_at),
            used: Set(model.used),
        };
        active
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Newest unused, unexpired code matching `code` for a student.
    pub async fn find_active(
        &self,
        student_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<sms_otp::Model>> {
        SmsOtp::find()
            .filter(sms_otp::Column::StudentId.eq(student_id))
            .filter(sms_otp::Column::OtpCode.eq(code))
            .filter(sms_otp::Column::Used.eq(false))
            .filter(sms_otp::Column::ExpiresAt.gt(now))
            .order_by_desc(sms_otp::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Consume a code. Returns false when it was already used, so two
    /// concurrent verifications cannot both succeed.
    pub async fn mark_used(&self, id: &str) -> AppResult<bool> {
        let result = SmsOtp::update_many()
            .col_expr(sms_otp::Column::Used, Expr::value(true))
            .filter(sms_otp::Column::Id.eq(id))
            .filter(sms_otp::Column::Used.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Delete codes that expired before `before`.
    pub async fn delete_expired_before(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = SmsOtp::delete_many()
            .filter(sms_otp::Column::ExpiresAt.lt(before))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}
