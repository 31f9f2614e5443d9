use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VotingStatus::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VotingStatus::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VotingStatus::IsOpen)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(VotingStatus::Version)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(VotingStatus::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Seed the single row
        let seed = Query::insert()
            .into_table(VotingStatus::Table)
            .columns([VotingStatus::Id, VotingStatus::IsOpen, VotingStatus::Version])
            .values([1.into(), true.into(), 0i64.into()])
            .map_err(|e| DbErr::Custom(e.to_string()))?
            .to_owned();
        manager.exec_stmt(seed).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VotingStatus::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum VotingStatus {
    Table,
    Id,
    IsOpen,
    Version,
    UpdatedAt,
}
