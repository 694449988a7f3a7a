//! Follow repository.

use std::sync::Arc;

use crate::entities::{Follow, follow, follow::FollowTargetType};
use curio_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<follow::Model>> {
        Follow::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a follow by its natural key.
    pub async fn find_by_key(
        &self,
        follower_id: &str,
        target_id: &str,
        target_type: FollowTargetType,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::TargetId.eq(target_id))
            .filter(follow::Column::TargetType.eq(target_type))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new follow.
    pub async fn create(&self, model: follow::ActiveModel) -> AppResult<follow::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a follow.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let follow = self.find_by_id(id).await?;
        if let Some(f) = follow {
            f.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Record the external record id once publishing succeeded.
    pub async fn mark_published(&self, id: &str, record_id: &str) -> AppResult<()> {
        Follow::update_many()
            .col_expr(
                follow::Column::PublishedRecordId,
                Expr::value(Some(record_id.to_string())),
            )
            .filter(follow::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All follows pointing at one target.
    pub async fn find_followers(
        &self,
        target_id: &str,
        target_type: FollowTargetType,
    ) -> AppResult<Vec<follow::Model>> {
        Follow::find()
            .filter(follow::Column::TargetId.eq(target_id))
            .filter(follow::Column::TargetType.eq(target_type))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All follows pointing at any of the given collections.
    pub async fn find_followers_of_collections(
        &self,
        collection_ids: &[String],
    ) -> AppResult<Vec<follow::Model>> {
        if collection_ids.is_empty() {
            return Ok(Vec::new());
        }
        Follow::find()
            .filter(follow::Column::TargetType.eq(FollowTargetType::Collection))
            .filter(follow::Column::TargetId.is_in(collection_ids.iter().map(String::as_str)))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
