//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `ballot_test`)
//!   `TEST_DB_PASSWORD` (default: `ballot_test`)
//!   `TEST_DB_NAME` (default: `ballot_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ballot_db::entities::{candidate, student_details, vote, voting_category};
use ballot_db::repositories::{DetailsInsert, VoteInsert};
use ballot_db::test_utils::{TestDatabase, TestDbConfig, sample_student};
use ballot_db::{ElectionStore, SeaOrmStore};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};

const STUDENT_ID: &str = "01200644D";

async fn seeded_store(db: &TestDatabase) -> SeaOrmStore {
    let conn = db.connection();
    let student: ballot_db::entities::student::ActiveModel =
        sample_student(STUDENT_ID, "0241234567").into();
    student.insert(conn.as_ref()).await.unwrap();

    voting_category::ActiveModel {
        id: Set(1),
        name: Set("President".to_string()),
        display_order: Set(1),
    }
    .insert(conn.as_ref())
    .await
    .unwrap();

    candidate::ActiveModel {
        id: Set(10),
        name: Set("Kofi Boateng".to_string()),
        category_id: Set(1),
        photo_url: Set(None),
    }
    .insert(conn.as_ref())
    .await
    .unwrap();

    SeaOrmStore::new(conn)
}

fn vote_row(id: &str) -> vote::Model {
    vote::Model {
        id: id.to_string(),
        student_id: STUDENT_ID.to_string(),
        candidate_id: 10,
        category_id: 1,
        created_at: Utc::now().into(),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_voting_status_seeded_open() {
    let db = TestDatabase::create_unique().await.expect("Failed to create");
    let store = SeaOrmStore::new(db.connection());

    let status = store.voting_status().await.unwrap().expect("seeded row");
    assert!(status.is_open);

    let closed = store.set_voting_open(false).await.unwrap();
    assert!(!closed.is_open);
    assert_eq!(closed.version, status.version + 1);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_unique_index_rejects_concurrent_duplicate_votes() {
    let db = TestDatabase::create_unique().await.expect("Failed to create");
    let store = seeded_store(&db).await;

    let (a, b) = tokio::join!(
        store.insert_vote(vote_row("vote_a")),
        store.insert_vote(vote_row("vote_b"))
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let inserted = outcomes
        .iter()
        .filter(|o| matches!(o, VoteInsert::Inserted(_)))
        .count();
    assert_eq!(inserted, 1);
    assert_eq!(store.find_votes(STUDENT_ID, Some(1)).await.unwrap().len(), 1);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_student_details_uniqueness_outcomes() {
    let db = TestDatabase::create_unique().await.expect("Failed to create");
    let store = seeded_store(&db).await;

    let details = student_details::Model {
        student_id: STUDENT_ID.to_string(),
        name: "Ama Mensah".to_string(),
        phone: "0241234567".to_string(),
        email: "ama@example.com".to_string(),
        programme: "Computer Science".to_string(),
        level: 300,
        created_at: Utc::now().into(),
    };

    let first = store.insert_student_details(details.clone()).await.unwrap();
    assert!(matches!(first, DetailsInsert::Inserted(_)));

    let again = store
        .insert_student_details(student_details::Model {
            email: "other@example.com".to_string(),
            ..details
        })
        .await
        .unwrap();
    assert_eq!(again, DetailsInsert::AlreadyCompleted);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_mixed_case_student_keeps_stored_id() {
    let db = TestDatabase::create_unique().await.expect("Failed to create");
    let store = seeded_store(&db).await;

    let student = store
        .find_student(" 01200644d ")
        .await
        .unwrap()
        .expect("case-insensitive lookup");
    assert_eq!(student.student_id, STUDENT_ID);

    store.set_has_voted(&student.student_id).await.unwrap();
    let student = store.find_student("01200644D").await.unwrap().unwrap();
    assert!(student.has_voted);

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.database.is_empty());
}
