use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VotingCategory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VotingCategory::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VotingCategory::Name).string_len(128).not_null())
                    .col(
                        ColumnDef::new(VotingCategory::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VotingCategory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum VotingCategory {
    Table,
    Id,
    Name,
    DisplayOrder,
}
