//! Student contact details completed before voting.

use std::sync::Arc;

use ballot_common::{AppError, AppResult};
use ballot_db::{ElectionStore, entities::student_details, repositories::DetailsInsert};
use chrono::Utc;
use serde::Serialize;
use validator::ValidateEmail;

use super::identity::{RECORD_INCOMPLETE, require_student};

pub const EMAIL_TAKEN: &str = "This email address has already been used by another student.";
pub const DETAILS_COMPLETED: &str = "You have already completed your details.";
pub const INVALID_EMAIL: &str = "Please enter a valid email address.";
pub const EMAIL_AVAILABLE: &str = "Email is available.";

/// What the voter sees about themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student_id: String,
    pub name: Option<String>,
    pub programme: Option<String>,
    pub level: Option<i32>,
    pub email: Option<String>,
    pub details_completed: bool,
}

/// Student details service.
#[derive(Clone)]
pub struct StudentDetailsService {
    store: Arc<dyn ElectionStore>,
}

impl StudentDetailsService {
    /// Create a new student details service.
    #[must_use]
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }

    /// Fail with `Conflict` if another student already used this email.
    pub async fn check_email_available(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email)?;
        if self.store.email_in_use(&email).await? {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }
        Ok(())
    }

    /// Record the student's email alongside their roll details.
    pub async fn save_details(
        &self,
        student_id: &str,
        email: &str,
    ) -> AppResult<student_details::Model> {
        let email = normalize_email(email)?;
        if self.store.email_in_use(&email).await? {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let student = require_student(self.store.as_ref(), student_id).await?;
        let (Some(name), Some(phone), Some(programme), Some(level)) = (
            student.name.clone(),
            student.phone.clone(),
            student.programme.clone(),
            student.level,
        ) else {
            return Err(AppError::Validation(RECORD_INCOMPLETE.to_string()));
        };

        let details = student_details::Model {
            student_id: student.student_id.clone(),
            name,
            phone,
            email,
            programme,
            level,
            created_at: Utc::now().into(),
        };

        match self.store.insert_student_details(details).await? {
            DetailsInsert::Inserted(saved) => {
                tracing::info!(student_id = %saved.student_id, "Student details saved");
                Ok(saved)
            }
            DetailsInsert::EmailTaken => Err(AppError::Conflict(EMAIL_TAKEN.to_string())),
            DetailsInsert::AlreadyCompleted => {
                Err(AppError::Conflict(DETAILS_COMPLETED.to_string()))
            }
        }
    }

    /// Name, programme and level plus any recorded email.
    pub async fn profile(&self, student_id: &str) -> AppResult<StudentProfile> {
        let student = require_student(self.store.as_ref(), student_id).await?;
        let details = self.store.find_student_details(&student.student_id).await?;

        Ok(StudentProfile {
            student_id: student.student_id,
            name: student.name,
            programme: student.programme,
            level: student.level,
            details_completed: details.is_some(),
            email: details.map(|d| d.email),
        })
    }
}

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !email.validate_email() {
        return Err(AppError::Validation(INVALID_EMAIL.to_string()));
    }
    Ok(email)
}
