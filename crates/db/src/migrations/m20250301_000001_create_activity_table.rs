//! Create activity table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Activity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activity::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Activity::ActorId).string_len(32).not_null())
                    .col(ColumnDef::new(Activity::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Activity::CardId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Activity::CollectionIds)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activity::UrlType).string_len(32))
                    .col(ColumnDef::new(Activity::Source).string_len(64))
                    .col(
                        ColumnDef::new(Activity::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (actor_id, card_id, id) - dedup-window lookup; the window
        // is an id range because the ULID id carries the insertion time
        manager
            .create_index(
                Index::create()
                    .name("idx_activity_actor_card_id")
                    .table(Activity::Table)
                    .col(Activity::ActorId)
                    .col(Activity::CardId)
                    .col(Activity::Id)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (global feed pagination)
        manager
            .create_index(
                Index::create()
                    .name("idx_activity_created_at")
                    .table(Activity::Table)
                    .col(Activity::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Activity::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Activity {
    Table,
    Id,
    ActorId,
    Kind,
    CardId,
    CollectionIds,
    UrlType,
    Source,
    CreatedAt,
}
