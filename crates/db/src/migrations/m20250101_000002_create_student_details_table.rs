use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StudentDetails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StudentDetails::StudentId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StudentDetails::Name).string_len(256).not_null())
                    .col(ColumnDef::new(StudentDetails::Phone).string_len(32).not_null())
                    .col(ColumnDef::new(StudentDetails::Email).string_len(320).not_null())
                    .col(
                        ColumnDef::new(StudentDetails::Programme)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StudentDetails::Level).integer().not_null())
                    .col(
                        ColumnDef::new(StudentDetails::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_student_details_student")
                            .from(StudentDetails::Table, StudentDetails::StudentId)
                            .to(Student::Table, Student::StudentId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("unique_student_email")
                    .table(StudentDetails::Table)
                    .col(StudentDetails::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StudentDetails::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum StudentDetails {
    Table,
    StudentId,
    Name,
    Phone,
    Email,
    Programme,
    Level,
    CreatedAt,
}

#[derive(Iden)]
pub enum Student {
    Table,
    StudentId,
}
