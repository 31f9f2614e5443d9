use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SmsOtp::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SmsOtp::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SmsOtp::StudentId).string_len(64).not_null())
                    .col(ColumnDef::new(SmsOtp::Phone).string_len(32).not_null())
                    .col(ColumnDef::new(SmsOtp::OtpCode).string_len(6).not_null())
                    .col(
                        ColumnDef::new(SmsOtp::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SmsOtp::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SmsOtp::Used)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sms_otp_student")
                            .from(SmsOtp::Table, SmsOtp::StudentId)
                            .to(Student::Table, Student::StudentId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Rate-limit history scans: WHERE student_id = ? AND created_at > ?
        manager
            .create_index(
                Index::create()
                    .name("idx_sms_otp_student_created")
                    .table(SmsOtp::Table)
                    .col(SmsOtp::StudentId)
                    .col(SmsOtp::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sms_otp_expires_at")
                    .table(SmsOtp::Table)
                    .col(SmsOtp::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SmsOtp::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum SmsOtp {
    Table,
    Id,
    StudentId,
    Phone,
    OtpCode,
    CreatedAt,
    ExpiresAt,
    Used,
}

#[derive(Iden)]
pub enum Student {
    Table,
    StudentId,
}
