//! Student identity lookups shared by the verification and ballot services.

use ballot_common::{AppError, AppResult};
use ballot_db::{ElectionStore, entities::student};

pub const STUDENT_NOT_FOUND: &str = "Student ID not found. Please check your ID and try again.";
pub const ALREADY_VOTED: &str = "You have already voted in this election.";
pub const RECORD_INCOMPLETE: &str =
    "Student record is incomplete. Please contact the administrator.";

/// Lookup form of a typed student ID: trimmed and lowercased.
///
/// Only for finding the row. Codes, votes and `has_voted` are keyed by the
/// `student_id` of the loaded row, which keeps the roll's own casing.
#[must_use]
pub fn canonical_student_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Load a student or fail with `NotFound`.
pub async fn require_student(
    store: &dyn ElectionStore,
    student_id: &str,
) -> AppResult<student::Model> {
    store
        .find_student(&canonical_student_id(student_id))
        .await?
        .ok_or_else(|| AppError::NotFound(STUDENT_NOT_FOUND.to_string()))
}

/// Load a student who may still vote: present and `has_voted = false`.
pub async fn require_eligible_student(
    store: &dyn ElectionStore,
    student_id: &str,
) -> AppResult<student::Model> {
    let student = require_student(store, student_id).await?;
    if student.has_voted {
        return Err(AppError::Conflict(ALREADY_VOTED.to_string()));
    }
    Ok(student)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_student_id() {
        assert_eq!(canonical_student_id("  01200644D "), "01200644d");
    }
}
