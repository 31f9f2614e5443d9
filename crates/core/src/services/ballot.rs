//! Ballot submission.
//!
//! At most one vote per (student, category). The pre-insert lookup only
//! exists to give a friendly message; the store's uniqueness rule is what
//! holds under concurrent submissions. When every category has a vote the
//! student is marked as having voted.

use std::collections::BTreeSet;
use std::sync::Arc;

use ballot_common::{AppError, AppResult, IdGenerator};
use ballot_db::{ElectionStore, entities::vote, repositories::VoteInsert};
use chrono::Utc;
use serde::Serialize;

use super::identity::{ALREADY_VOTED, canonical_student_id, require_student};
use super::voting_status::VotingGate;

pub const MISSING_VOTE_FIELDS: &str = "Missing required information for voting.";
pub const ALREADY_VOTED_CATEGORY: &str = "You have already voted in this category.";
pub const INVALID_CANDIDATE: &str = "Invalid candidate selection.";
pub const BALLOT_INCOMPLETE: &str = "Please vote in all categories before finishing.";

/// A candidate as shown on the ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotCandidate {
    pub id: i32,
    pub name: String,
    pub photo_url: Option<String>,
}

/// A category with its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotCategory {
    pub id: i32,
    pub name: String,
    pub display_order: i32,
    pub candidates: Vec<BallotCandidate>,
}

/// Everything needed to render the ballot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub categories: Vec<BallotCategory>,
    pub voting_open: bool,
}

/// Which categories a student has covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotProgress {
    pub voted_categories: Vec<i32>,
    pub total_categories: usize,
    pub completed: bool,
}

/// Returned for every accepted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub category_id: i32,
    pub candidate_id: i32,
    pub voted_categories: Vec<i32>,
    pub total_categories: usize,
    /// Set once the last category is covered; the student is then marked
    /// as having voted.
    pub completed: bool,
    pub student_name: Option<String>,
}

/// Shown on the confirmation view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub completed: bool,
    pub student_name: Option<String>,
}

/// Ballot submission engine.
#[derive(Clone)]
pub struct BallotService {
    store: Arc<dyn ElectionStore>,
    gate: VotingGate,
    id_gen: IdGenerator,
}

impl BallotService {
    /// Create a new ballot service.
    #[must_use]
    pub fn new(store: Arc<dyn ElectionStore>, gate: VotingGate) -> Self {
        Self {
            store,
            gate,
            id_gen: IdGenerator::new(),
        }
    }

    /// Categories in display order with their candidates.
    pub async fn ballot(&self) -> AppResult<Ballot> {
        let categories = self.store.list_categories().await?;
        let candidates = self.store.list_candidates().await?;

        let categories = categories
            .into_iter()
            .map(|category| BallotCategory {
                candidates: candidates
                    .iter()
                    .filter(|c| c.category_id == category.id)
                    .map(|c| BallotCandidate {
                        id: c.id,
                        name: c.name.clone(),
                        photo_url: c.photo_url.clone(),
                    })
                    .collect(),
                id: category.id,
                name: category.name,
                display_order: category.display_order,
            })
            .collect();

        Ok(Ballot {
            categories,
            voting_open: self.gate.is_open().await?,
        })
    }

    /// Record one vote.
    pub async fn submit_vote(
        &self,
        student_id: &str,
        candidate_id: i32,
        category_id: i32,
    ) -> AppResult<VoteReceipt> {
        if student_id.trim().is_empty() || candidate_id <= 0 || category_id <= 0 {
            return Err(AppError::Validation(MISSING_VOTE_FIELDS.to_string()));
        }

        self.gate.ensure_open().await?;

        let student = require_student(self.store.as_ref(), student_id).await?;
        let student_id = student.student_id.clone();

        let candidate = self
            .store
            .find_candidate(candidate_id)
            .await?
            .filter(|c| c.category_id == category_id)
            .ok_or_else(|| AppError::Validation(INVALID_CANDIDATE.to_string()))?;

        if !self
            .store
            .find_votes(&student_id, Some(category_id))
            .await?
            .is_empty()
        {
            return Err(AppError::Conflict(ALREADY_VOTED_CATEGORY.to_string()));
        }
        if student.has_voted {
            return Err(AppError::Conflict(ALREADY_VOTED.to_string()));
        }

        let row = vote::Model {
            id: self.id_gen.generate(),
            student_id: student_id.clone(),
            candidate_id: candidate.id,
            category_id,
            created_at: Utc::now().into(),
        };
        match self.store.insert_vote(row).await? {
            VoteInsert::Inserted(vote) => {
                tracing::info!(
                    student_id = %student_id,
                    category_id,
                    vote_id = %vote.id,
                    "Vote recorded"
                );
            }
            VoteInsert::Duplicate => {
                tracing::warn!(
                    student_id = %student_id,
                    category_id,
                    "Concurrent duplicate vote rejected by store"
                );
                return Err(AppError::Conflict(ALREADY_VOTED_CATEGORY.to_string()));
            }
        }

        let progress = self.progress_for(&student_id).await?;
        if progress.completed {
            self.set_has_voted(&student_id).await?;
        }

        Ok(VoteReceipt {
            category_id,
            candidate_id: candidate.id,
            voted_categories: progress.voted_categories,
            total_categories: progress.total_categories,
            completed: progress.completed,
            student_name: student.name,
        })
    }

    /// Set `has_voted`. Calling it again is harmless.
    pub async fn mark_as_voted(&self, student_id: &str) -> AppResult<()> {
        let student = require_student(self.store.as_ref(), student_id).await?;
        self.set_has_voted(&student.student_id).await
    }

    /// Category IDs the student has voted in, ascending.
    ///
    /// An unknown student has no votes.
    pub async fn votes_for_student(&self, student_id: &str) -> AppResult<Vec<i32>> {
        match self
            .store
            .find_student(&canonical_student_id(student_id))
            .await?
        {
            Some(student) => self.voted_categories(&student.student_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Voted categories against the full category list.
    pub async fn progress(&self, student_id: &str) -> AppResult<BallotProgress> {
        let student = require_student(self.store.as_ref(), student_id).await?;
        self.progress_for(&student.student_id).await
    }

    /// Finalize a complete ballot and produce the confirmation.
    pub async fn finish(&self, student_id: &str) -> AppResult<Confirmation> {
        let student = require_student(self.store.as_ref(), student_id).await?;
        let progress = self.progress_for(&student.student_id).await?;
        if !progress.completed {
            return Err(AppError::Validation(BALLOT_INCOMPLETE.to_string()));
        }

        if !student.has_voted {
            self.set_has_voted(&student.student_id).await?;
        }

        Ok(Confirmation {
            completed: true,
            student_name: student.name,
        })
    }

    // The helpers below take the student ID exactly as stored.

    async fn set_has_voted(&self, student_id: &str) -> AppResult<()> {
        self.store.set_has_voted(student_id).await?;
        tracing::info!(student_id = %student_id, "Student marked as voted");
        Ok(())
    }

    async fn voted_categories(&self, student_id: &str) -> AppResult<Vec<i32>> {
        let votes = self.store.find_votes(student_id, None).await?;
        let categories: BTreeSet<i32> = votes.into_iter().map(|v| v.category_id).collect();
        Ok(categories.into_iter().collect())
    }

    async fn progress_for(&self, student_id: &str) -> AppResult<BallotProgress> {
        let voted = self.voted_categories(student_id).await?;
        let categories = self.store.list_categories().await?;

        let completed =
            !categories.is_empty() && categories.iter().all(|c| voted.binary_search(&c.id).is_ok());

        Ok(BallotProgress {
            voted_categories: voted,
            total_categories: categories.len(),
            completed,
        })
    }
}
