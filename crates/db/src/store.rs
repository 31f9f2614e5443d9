//! The query surface the election services run against.
//!
//! Services hold an `Arc<dyn ElectionStore>`. [`SeaOrmStore`] is the
//! production implementation; [`crate::test_utils::MemoryStore`] backs unit
//! tests with the same uniqueness rules.

use std::sync::Arc;

use async_trait::async_trait;
use ballot_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;

use crate::entities::{
    candidate, sms_otp, student, student_details, vote, voting_category, voting_status,
};
use crate::repositories::{
    CandidateRepository, CandidateTally, DetailsInsert, SmsOtpRepository,
    StudentDetailsRepository, StudentRepository, VoteInsert, VoteRepository,
    VotingCategoryRepository, VotingStatusRepository,
};

/// Persistence operations used by the election core.
///
/// Only [`ElectionStore::find_student`] matches loosely. Every other method
/// takes the student ID exactly as stored on the returned row.
#[async_trait]
pub trait ElectionStore: Send + Sync {
    // === Students ===

    /// Find a student by ID, ignoring case and surrounding whitespace.
    async fn find_student(&self, student_id: &str) -> AppResult<Option<student::Model>>;

    /// Every student on the roll.
    async fn list_students(&self) -> AppResult<Vec<student::Model>>;

    /// Set `has_voted = true`. Fails with `NotFound` when the student is absent.
    async fn set_has_voted(&self, student_id: &str) -> AppResult<()>;

    // === Student details ===

    /// Details recorded for a student.
    async fn find_student_details(
        &self,
        student_id: &str,
    ) -> AppResult<Option<student_details::Model>>;

    /// Whether any student already recorded this email.
    async fn email_in_use(&self, email: &str) -> AppResult<bool>;

    /// Insert details; uniqueness violations come back as outcomes.
    async fn insert_student_details(
        &self,
        details: student_details::Model,
    ) -> AppResult<DetailsInsert>;

    // === One-time codes ===

    /// Mark all unused codes for a student as used.
    async fn invalidate_unused_otps(&self, student_id: &str) -> AppResult<u64>;

    /// Codes issued after `since`, newest first.
    async fn recent_otps(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<sms_otp::Model>>;

    /// Persist a new code.
    async fn insert_otp(&self, otp: sms_otp::Model) -> AppResult<sms_otp::Model>;

    /// Newest unused code matching `code` that expires after `now`.
    async fn find_active_otp(
        &self,
        student_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<sms_otp::Model>>;

    /// Consume a code; false if it was already used.
    async fn mark_otp_used(&self, id: &str) -> AppResult<bool>;

    /// Delete codes that expired before `before`.
    async fn purge_otps(&self, before: DateTime<Utc>) -> AppResult<u64>;

    // === Ballot ===

    /// Categories in display order.
    async fn list_categories(&self) -> AppResult<Vec<voting_category::Model>>;

    /// Every candidate.
    async fn list_candidates(&self) -> AppResult<Vec<candidate::Model>>;

    /// Find a candidate by ID.
    async fn find_candidate(&self, candidate_id: i32) -> AppResult<Option<candidate::Model>>;

    /// Votes cast by a student, optionally in one category, ordered by category.
    async fn find_votes(
        &self,
        student_id: &str,
        category_id: Option<i32>,
    ) -> AppResult<Vec<vote::Model>>;

    /// Insert a vote unless one already exists for (student, category).
    async fn insert_vote(&self, vote: vote::Model) -> AppResult<VoteInsert>;

    /// Vote counts per candidate.
    async fn tally_votes(&self) -> AppResult<Vec<CandidateTally>>;

    // === Voting gate ===

    /// The voting status row, if present.
    async fn voting_status(&self) -> AppResult<Option<voting_status::Model>>;

    /// Open or close voting, bumping the version.
    async fn set_voting_open(&self, is_open: bool) -> AppResult<voting_status::Model>;
}

/// [`ElectionStore`] backed by `PostgreSQL` through sea-orm.
#[derive(Clone)]
pub struct SeaOrmStore {
    students: StudentRepository,
    details: StudentDetailsRepository,
    otps: SmsOtpRepository,
    categories: VotingCategoryRepository,
    candidates: CandidateRepository,
    votes: VoteRepository,
    status: VotingStatusRepository,
}

impl SeaOrmStore {
    /// Build the store over a shared connection.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            students: StudentRepository::new(Arc::clone(&db)),
            details: StudentDetailsRepository::new(Arc::clone(&db)),
            otps: SmsOtpRepository::new(Arc::clone(&db)),
            categories: VotingCategoryRepository::new(Arc::clone(&db)),
            candidates: CandidateRepository::new(Arc::clone(&db)),
            votes: VoteRepository::new(Arc::clone(&db)),
            status: VotingStatusRepository::new(db),
        }
    }
}

#[async_trait]
impl ElectionStore for SeaOrmStore {
    async fn find_student(&self, student_id: &str) -> AppResult<Option<student::Model>> {
        self.students.find_by_id(student_id).await
    }

    async fn list_students(&self) -> AppResult<Vec<student::Model>> {
        self.students.find_all().await
    }

    async fn set_has_voted(&self, student_id: &str) -> AppResult<()> {
        if self.students.mark_voted(student_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Student not found: {student_id}")))
        }
    }

    async fn find_student_details(
        &self,
        student_id: &str,
    ) -> AppResult<Option<student_details::Model>> {
        self.details.find_by_student_id(student_id).await
    }

    async fn email_in_use(&self, email: &str) -> AppResult<bool> {
        self.details.email_exists(email).await
    }

    async fn insert_student_details(
        &self,
        details: student_details::Model,
    ) -> AppResult<DetailsInsert> {
        self.details.create(details).await
    }

    async fn invalidate_unused_otps(&self, student_id: &str) -> AppResult<u64> {
        self.otps.invalidate_unused(student_id).await
    }

    async fn recent_otps(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<sms_otp::Model>> {
        self.otps.find_since(student_id, since).await
    }

    async fn insert_otp(&self, otp: sms_otp::Model) -> AppResult<sms_otp::Model> {
        self.otps.create(otp).await
    }

    async fn find_active_otp(
        &self,
        student_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<sms_otp::Model>> {
        self.otps.find_active(student_id, code, now).await
    }

    async fn mark_otp_used(&self, id: &str) -> AppResult<bool> {
        self.otps.mark_used(id).await
    }

    async fn purge_otps(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.otps.delete_expired_before(before).await
    }

    async fn list_categories(&self) -> AppResult<Vec<voting_category::Model>> {
        self.categories.find_all_ordered().await
    }

    async fn list_candidates(&self) -> AppResult<Vec<candidate::Model>> {
        self.candidates.find_all().await
    }

    async fn find_candidate(&self, candidate_id: i32) -> AppResult<Option<candidate::Model>> {
        self.candidates.find_by_id(candidate_id).await
    }

    async fn find_votes(
        &self,
        student_id: &str,
        category_id: Option<i32>,
    ) -> AppResult<Vec<vote::Model>> {
        self.votes.find_by_student(student_id, category_id).await
    }

    async fn insert_vote(&self, vote: vote::Model) -> AppResult<VoteInsert> {
        self.votes.create(vote).await
    }

    async fn tally_votes(&self) -> AppResult<Vec<CandidateTally>> {
        self.votes.tally().await
    }

    async fn voting_status(&self) -> AppResult<Option<voting_status::Model>> {
        self.status.find().await
    }

    async fn set_voting_open(&self, is_open: bool) -> AppResult<voting_status::Model> {
        self.status.set_open(is_open).await
    }
}
