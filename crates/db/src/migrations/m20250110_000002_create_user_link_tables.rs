//! Create recipient link tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserTelegramLink::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserTelegramLink::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserTelegramLink::TelegramChatId)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: telegram_chat_id (unique both ways)
        manager
            .create_index(
                Index::create()
                    .name("idx_user_telegram_link_chat_id")
                    .table(UserTelegramLink::Table)
                    .col(UserTelegramLink::TelegramChatId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserEmailLink::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserEmailLink::UserId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserEmailLink::Email).string_len(320).not_null())
                    .to_owned(),
            )
            .await?;

        // Unique index: email
        manager
            .create_index(
                Index::create()
                    .name("idx_user_email_link_email")
                    .table(UserEmailLink::Table)
                    .col(UserEmailLink::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserEmailLink::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserTelegramLink::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum UserTelegramLink {
    Table,
    UserId,
    TelegramChatId,
}

#[derive(Iden)]
enum UserEmailLink {
    Table,
    UserId,
    Email,
}
