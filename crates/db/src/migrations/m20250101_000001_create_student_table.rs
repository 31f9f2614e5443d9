use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Student::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Student::StudentId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Student::Name).string_len(256))
                    .col(ColumnDef::new(Student::Phone).string_len(32))
                    .col(ColumnDef::new(Student::Programme).string_len(256))
                    .col(ColumnDef::new(Student::Level).integer())
                    .col(
                        ColumnDef::new(Student::HasVoted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Student::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Turnout queries filter on has_voted
        manager
            .create_index(
                Index::create()
                    .name("idx_student_has_voted")
                    .table(Student::Table)
                    .col(Student::HasVoted)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Student::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Student {
    Table,
    StudentId,
    Name,
    Phone,
    Programme,
    Level,
    HasVoted,
    CreatedAt,
}
