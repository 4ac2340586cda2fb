//! Create notification table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Notification::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Notification::UserId).uuid().not_null())
                    .col(ColumnDef::new(Notification::Channel).string_len(16).not_null())
                    .col(ColumnDef::new(Notification::Payload).text().not_null())
                    .col(
                        ColumnDef::new(Notification::RecipientIdentifier)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Notification::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notification::SentAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Notification::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Notification::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Notification::LastError).text())
                    .col(
                        ColumnDef::new(Notification::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Partial index over the claim predicate. sea-query has no builder
        // for partial indexes, so raw SQL it is.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_notification_due \
                 ON notification (status, scheduled_at) \
                 WHERE status = 'waiting'",
            )
            .await?;

        // Index: user_id
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_user_id")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    UserId,
    Channel,
    Payload,
    RecipientIdentifier,
    ScheduledAt,
    SentAt,
    Status,
    RetryCount,
    LastError,
    CreatedAt,
}
