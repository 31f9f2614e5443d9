use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Candidate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Candidate::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Candidate::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Candidate::CategoryId).integer().not_null())
                    .col(ColumnDef::new(Candidate::PhotoUrl).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_candidate_category")
                            .from(Candidate::Table, Candidate::CategoryId)
                            .to(VotingCategory::Table, VotingCategory::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_candidate_category_id")
                    .table(Candidate::Table)
                    .col(Candidate::CategoryId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Candidate::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Candidate {
    Table,
    Id,
    Name,
    CategoryId,
    PhotoUrl,
}

#[derive(Iden)]
pub enum VotingCategory {
    Table,
    Id,
}
