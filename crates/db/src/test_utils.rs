//! Test utilities for database operations.
//!
//! Provides an in-memory [`ElectionStore`] for service tests and helpers for
//! setting up and tearing down `PostgreSQL` test databases.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ballot_common::{AppError, AppResult, IdGenerator};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use tokio::sync::RwLock;
use tracing::info;

use crate::entities::{
    candidate, sms_otp, student, student_details, vote, voting_category, voting_status,
};
use crate::repositories::{CandidateTally, DetailsInsert, VoteInsert};
use crate::store::ElectionStore;

/// Build a complete student record.
#[must_use]
pub fn sample_student(student_id: &str, phone: &str) -> student::Model {
    student::Model {
        student_id: student_id.trim().to_string(),
        name: Some("Ama Mensah".to_string()),
        phone: Some(phone.to_string()),
        programme: Some("Computer Science".to_string()),
        level: Some(300),
        has_voted: false,
        created_at: Utc::now().into(),
    }
}

#[derive(Default)]
struct MemoryState {
    students: BTreeMap<String, student::Model>,
    details: BTreeMap<String, student_details::Model>,
    otps: Vec<sms_otp::Model>,
    categories: Vec<voting_category::Model>,
    candidates: Vec<candidate::Model>,
    votes: Vec<vote::Model>,
    status: Option<voting_status::Model>,
}

/// In-memory [`ElectionStore`].
///
/// Every operation takes one lock, so the uniqueness checks on votes and
/// student details are atomic just like the database constraints.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    failing: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with voting open.
    #[must_use]
    pub fn new() -> Self {
        let status = voting_status::Model {
            id: voting_status::VOTING_STATUS_ID,
            is_open: true,
            version: 0,
            updated_at: Utc::now().into(),
        };
        Self {
            state: RwLock::new(MemoryState {
                status: Some(status),
                ..MemoryState::default()
            }),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with a database error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Add a student, keyed by the ID as given.
    pub async fn add_student(&self, model: student::Model) {
        let key = model.student_id.clone();
        self.state.write().await.students.insert(key, model);
    }

    /// Add a category.
    pub async fn add_category(&self, id: i32, name: &str, display_order: i32) {
        self.state.write().await.categories.push(voting_category::Model {
            id,
            name: name.to_string(),
            display_order,
        });
    }

    /// Add a candidate.
    pub async fn add_candidate(&self, id: i32, name: &str, category_id: i32) {
        self.state.write().await.candidates.push(candidate::Model {
            id,
            name: name.to_string(),
            category_id,
            photo_url: None,
        });
    }

    /// Remove the voting status row.
    pub async fn clear_voting_status(&self) {
        self.state.write().await.status = None;
    }

    /// Shift every code issued to a student `secs` seconds into the past.
    pub async fn backdate_otps(&self, student_id: &str, secs: i64) {
        let shift = Duration::seconds(secs);
        let mut state = self.state.write().await;
        for otp in state.otps.iter_mut().filter(|o| o.student_id == student_id) {
            otp.created_at -= shift;
            otp.expires_at -= shift;
        }
    }

    /// Codes issued to a student in insertion order.
    pub async fn otps_for(&self, student_id: &str) -> Vec<sms_otp::Model> {
        self.state
            .read()
            .await
            .otps
            .iter()
            .filter(|o| o.student_id == student_id)
            .cloned()
            .collect()
    }

    /// All recorded votes.
    pub async fn all_votes(&self) -> Vec<vote::Model> {
        self.state.read().await.votes.clone()
    }

    fn check(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AppError::Database("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ElectionStore for MemoryStore {
    async fn find_student(&self, student_id: &str) -> AppResult<Option<student::Model>> {
        self.check()?;
        let wanted = student_id.trim().to_lowercase();
        Ok(self
            .state
            .read()
            .await
            .students
            .values()
            .find(|s| s.student_id.to_lowercase() == wanted)
            .cloned())
    }

    async fn list_students(&self) -> AppResult<Vec<student::Model>> {
        self.check()?;
        Ok(self.state.read().await.students.values().cloned().collect())
    }

    async fn set_has_voted(&self, student_id: &str) -> AppResult<()> {
        self.check()?;
        match self.state.write().await.students.get_mut(student_id) {
            Some(student) => {
                student.has_voted = true;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Student not found: {student_id}"))),
        }
    }

    async fn find_student_details(
        &self,
        student_id: &str,
    ) -> AppResult<Option<student_details::Model>> {
        self.check()?;
        Ok(self.state.read().await.details.get(student_id).cloned())
    }

    async fn email_in_use(&self, email: &str) -> AppResult<bool> {
        self.check()?;
        Ok(self
            .state
            .read()
            .await
            .details
            .values()
            .any(|d| d.email == email))
    }

    async fn insert_student_details(
        &self,
        details: student_details::Model,
    ) -> AppResult<DetailsInsert> {
        self.check()?;
        let mut state = self.state.write().await;
        if state.details.values().any(|d| d.email == details.email) {
            return Ok(DetailsInsert::EmailTaken);
        }
        if state.details.contains_key(&details.student_id) {
            return Ok(DetailsInsert::AlreadyCompleted);
        }
        state
            .details
            .insert(details.student_id.clone(), details.clone());
        Ok(DetailsInsert::Inserted(details))
    }

    async fn invalidate_unused_otps(&self, student_id: &str) -> AppResult<u64> {
        self.check()?;
        let mut state = self.state.write().await;
        let mut count = 0;
        for otp in state
            .otps
            .iter_mut()
            .filter(|o| o.student_id == student_id && !o.used)
        {
            otp.used = true;
            count += 1;
        }
        Ok(count)
    }

    async fn recent_otps(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<sms_otp::Model>> {
        self.check()?;
        let mut otps: Vec<_> = self
            .state
            .read()
            .await
            .otps
            .iter()
            .filter(|o| o.student_id == student_id && o.created_at > since)
            .cloned()
            .collect();
        otps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(otps)
    }

    async fn insert_otp(&self, otp: sms_otp::Model) -> AppResult<sms_otp::Model> {
        self.check()?;
        self.state.write().await.otps.push(otp.clone());
        Ok(otp)
    }

    async fn find_active_otp(
        &self,
        student_id: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<sms_otp::Model>> {
        self.check()?;
        Ok(self
            .state
            .read()
            .await
            .otps
            .iter()
            .filter(|o| {
                o.student_id == student_id && o.otp_code == code && !o.used && o.expires_at > now
            })
            .max_by_key(|o| o.created_at)
            .cloned())
    }

    async fn mark_otp_used(&self, id: &str) -> AppResult<bool> {
        self.check()?;
        let mut state = self.state.write().await;
        match state.otps.iter_mut().find(|o| o.id == id && !o.used) {
            Some(otp) => {
                otp.used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge_otps(&self, before: DateTime<Utc>) -> AppResult<u64> {
        self.check()?;
        let mut state = self.state.write().await;
        let len = state.otps.len();
        state.otps.retain(|o| o.expires_at >= before);
        Ok((len - state.otps.len()) as u64)
    }

    async fn list_categories(&self) -> AppResult<Vec<voting_category::Model>> {
        self.check()?;
        let mut categories = self.state.read().await.categories.clone();
        categories.sort_by_key(|c| (c.display_order, c.id));
        Ok(categories)
    }

    async fn list_candidates(&self) -> AppResult<Vec<candidate::Model>> {
        self.check()?;
        let mut candidates = self.state.read().await.candidates.clone();
        candidates.sort_by_key(|c| c.id);
        Ok(candidates)
    }

    async fn find_candidate(&self, candidate_id: i32) -> AppResult<Option<candidate::Model>> {
        self.check()?;
        Ok(self
            .state
            .read()
            .await
            .candidates
            .iter()
            .find(|c| c.id == candidate_id)
            .cloned())
    }

    async fn find_votes(
        &self,
        student_id: &str,
        category_id: Option<i32>,
    ) -> AppResult<Vec<vote::Model>> {
        self.check()?;
        let mut votes: Vec<_> = self
            .state
            .read()
            .await
            .votes
            .iter()
            .filter(|v| v.student_id == student_id)
            .filter(|v| category_id.is_none_or(|c| v.category_id == c))
            .cloned()
            .collect();
        votes.sort_by_key(|v| v.category_id);
        Ok(votes)
    }

    async fn insert_vote(&self, vote: vote::Model) -> AppResult<VoteInsert> {
        self.check()?;
        let mut state = self.state.write().await;
        let duplicate = state
            .votes
            .iter()
            .any(|v| v.student_id == vote.student_id && v.category_id == vote.category_id);
        if duplicate {
            return Ok(VoteInsert::Duplicate);
        }
        state.votes.push(vote.clone());
        Ok(VoteInsert::Inserted(vote))
    }

    async fn tally_votes(&self) -> AppResult<Vec<CandidateTally>> {
        self.check()?;
        let mut counts: BTreeMap<(i32, i32), i64> = BTreeMap::new();
        for vote in &self.state.read().await.votes {
            *counts
                .entry((vote.candidate_id, vote.category_id))
                .or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((candidate_id, category_id), votes)| CandidateTally {
                candidate_id,
                category_id,
                votes,
            })
            .collect())
    }

    async fn voting_status(&self) -> AppResult<Option<voting_status::Model>> {
        self.check()?;
        Ok(self.state.read().await.status.clone())
    }

    async fn set_voting_open(&self, is_open: bool) -> AppResult<voting_status::Model> {
        self.check()?;
        let mut state = self.state.write().await;
        let version = state.status.as_ref().map_or(0, |s| s.version) + 1;
        let row = voting_status::Model {
            id: voting_status::VOTING_STATUS_ID,
            is_open,
            version,
            updated_at: Utc::now().into(),
        };
        state.status = Some(row.clone());
        Ok(row)
    }
}

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "ballot_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "ballot_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "ballot_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// URL of the maintenance database, used to create and drop test databases.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/postgres",
            self.username, self.password, self.host, self.port
        )
    }
}

/// A migrated `PostgreSQL` database for integration tests.
pub struct TestDatabase {
    /// Shared database connection, ready to hand to repositories.
    pub conn: Arc<DatabaseConnection>,
    /// Database configuration.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to the configured test database and run migrations.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Connect with a custom configuration and run migrations.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Self::migrate(&conn).await?;

        info!(database = %config.database, "Connected to test database");
        Ok(Self {
            conn: Arc::new(conn),
            config,
        })
    }

    /// Create a fresh, uniquely named database (for parallel tests).
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = IdGenerator::new().generate();
        config.database = format!("ballot_test_{}", &suffix[suffix.len() - 8..]);

        let postgres_conn = Database::connect(&config.postgres_url()).await?;
        let create_db = format!("CREATE DATABASE \"{}\"", config.database);
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, create_db))
            .await?;
        postgres_conn.close().await?;

        let conn = Database::connect(&config.database_url()).await?;
        Self::migrate(&conn).await?;

        info!(database = %config.database, "Created unique test database");
        Ok(Self {
            conn: Arc::new(conn),
            config,
        })
    }

    async fn migrate(conn: &DatabaseConnection) -> Result<(), DbErr> {
        use sea_orm_migration::MigratorTrait;
        crate::migrations::Migrator::up(conn, None).await
    }

    /// Get the shared database connection.
    #[must_use]
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }

    /// Truncate every election table.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let truncate = "TRUNCATE TABLE vote, candidate, voting_category, sms_otp, \
                        student_details, student CASCADE";
        self.conn
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                truncate.to_string(),
            ))
            .await?;

        info!("Cleaned up test database");
        Ok(())
    }

    /// Drop a database made by [`Self::create_unique`].
    pub async fn drop_database(self) -> Result<(), DbErr> {
        // Repositories may still hold clones; FORCE below ends their sessions.
        if let Ok(conn) = Arc::try_unwrap(self.conn) {
            conn.close().await?;
        }

        let postgres_conn = Database::connect(&self.config.postgres_url()).await?;
        let drop_db = format!(
            "DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)",
            self.config.database
        );
        postgres_conn
            .execute(Statement::from_string(DatabaseBackend::Postgres, drop_db))
            .await?;
        postgres_conn.close().await?;

        info!(database = %self.config.database, "Dropped test database");
        Ok(())
    }
}
