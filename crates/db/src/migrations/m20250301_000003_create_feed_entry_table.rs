//! Create feed entry table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FeedEntry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FeedEntry::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FeedEntry::RecipientId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FeedEntry::ActivityId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FeedEntry::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feed_entry_activity")
                            .from(FeedEntry::Table, FeedEntry::ActivityId)
                            .to(Activity::Table, Activity::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (recipient_id, activity_id) - the fan-out
        // idempotency invariant; duplicate deliveries hit DO NOTHING
        manager
            .create_index(
                Index::create()
                    .name("idx_feed_entry_recipient_activity")
                    .table(FeedEntry::Table)
                    .col(FeedEntry::RecipientId)
                    .col(FeedEntry::ActivityId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: recipient_id (following-feed pagination)
        manager
            .create_index(
                Index::create()
                    .name("idx_feed_entry_recipient_id")
                    .table(FeedEntry::Table)
                    .col(FeedEntry::RecipientId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FeedEntry::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FeedEntry {
    Table,
    Id,
    RecipientId,
    ActivityId,
    CreatedAt,
}

#[derive(Iden)]
enum Activity {
    Table,
    Id,
}
