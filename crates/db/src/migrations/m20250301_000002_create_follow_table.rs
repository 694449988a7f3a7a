//! Create follow table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Follow::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Follow::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Follow::FollowerId).string_len(32).not_null())
                    .col(ColumnDef::new(Follow::TargetId).string_len(32).not_null())
                    .col(ColumnDef::new(Follow::TargetType).string_len(16).not_null())
                    .col(ColumnDef::new(Follow::PublishedRecordId).string_len(256))
                    .col(
                        ColumnDef::new(Follow::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (follower_id, target_id, target_type) - natural key,
        // makes re-follow idempotent at the storage level
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_follower_target")
                    .table(Follow::Table)
                    .col(Follow::FollowerId)
                    .col(Follow::TargetId)
                    .col(Follow::TargetType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (target_id, target_type) - follower resolution
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_target")
                    .table(Follow::Table)
                    .col(Follow::TargetId)
                    .col(Follow::TargetType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Follow::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Follow {
    Table,
    Id,
    FollowerId,
    TargetId,
    TargetType,
    PublishedRecordId,
    CreatedAt,
}
