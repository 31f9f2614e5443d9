//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_student_table;
mod m20250101_000002_create_student_details_table;
mod m20250101_000003_create_sms_otp_table;
mod m20250101_000004_create_voting_category_table;
mod m20250101_000005_create_candidate_table;
mod m20250101_000006_create_vote_table;
mod m20250101_000007_create_voting_status_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_student_table::Migration),
            Box::new(m20250101_000002_create_student_details_table::Migration),
            Box::new(m20250101_000003_create_sms_otp_table::Migration),
            Box::new(m20250101_000004_create_voting_category_table::Migration),
            Box::new(m20250101_000005_create_candidate_table::Migration),
            Box::new(m20250101_000006_create_vote_table::Migration),
            Box::new(m20250101_000007_create_voting_status_table::Migration),
        ]
    }
}
