use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Vote::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Vote::StudentId).string_len(64).not_null())
                    .col(ColumnDef::new(Vote::CandidateId).integer().not_null())
                    .col(ColumnDef::new(Vote::CategoryId).integer().not_null())
                    .col(
                        ColumnDef::new(Vote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_student")
                            .from(Vote::Table, Vote::StudentId)
                            .to(Student::Table, Student::StudentId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_candidate")
                            .from(Vote::Table, Vote::CandidateId)
                            .to(Candidate::Table, Candidate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_category")
                            .from(Vote::Table, Vote::CategoryId)
                            .to(VotingCategory::Table, VotingCategory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One vote per student per category, authoritative under concurrency
        manager
            .create_index(
                Index::create()
                    .name("unique_vote_student_category")
                    .table(Vote::Table)
                    .col(Vote::StudentId)
                    .col(Vote::CategoryId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vote_candidate_id")
                    .table(Vote::Table)
                    .col(Vote::CandidateId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Vote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Vote {
    Table,
    Id,
    StudentId,
    CandidateId,
    CategoryId,
    CreatedAt,
}

#[derive(Iden)]
pub enum Student {
    Table,
    StudentId,
}

#[derive(Iden)]
pub enum Candidate {
    Table,
    Id,
}

#[derive(Iden)]
pub enum VotingCategory {
    Table,
    Id,
}
