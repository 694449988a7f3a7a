//! Activity repository.

use std::sync::Arc;

use crate::entities::{Activity, activity};
use chrono::{DateTime, Utc};
use curio_common::{AppError, AppResult, min_id_at};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Optional attribute filters applied to feed pages.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Restrict to one URL type (article, video, ...).
    pub url_type: Option<String>,
    /// Restrict to one producing source/client.
    pub source: Option<String>,
}

/// Activity repository for database operations.
#[derive(Clone)]
pub struct ActivityRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityRepository {
    /// Create a new activity repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an activity by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<activity::Model>> {
        Activity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the most recent activity for `(actor, card)` inserted at or
    /// after `since`. This is the dedup-window lookup.
    ///
    /// The window is measured on insertion time via the id's embedded
    /// timestamp, not on `created_at`: backdated activities (historical
    /// imports carry the card's original time) must still collapse when
    /// the same fact is delivered twice.
    pub async fn find_recent_by_actor_card(
        &self,
        actor_id: &str,
        card_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Option<activity::Model>> {
        Activity::find()
            .filter(activity::Column::ActorId.eq(actor_id))
            .filter(activity::Column::CardId.eq(card_id))
            .filter(activity::Column::Id.gte(min_id_at(since)))
            .order_by_desc(activity::Column::Id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new activity.
    pub async fn create(&self, model: activity::ActiveModel) -> AppResult<activity::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the denormalized collection id list of an activity.
    ///
    /// Used by the dedup-window merge; callers compute the union first.
    pub async fn set_collection_ids(&self, id: &str, collection_ids: &[String]) -> AppResult<()> {
        Activity::update_many()
            .col_expr(
                activity::Column::CollectionIds,
                Expr::value(serde_json::json!(collection_ids)),
            )
            .filter(activity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Global feed page: newest first, cursor on activity id.
    pub async fn find_page(
        &self,
        limit: u64,
        until_id: Option<&str>,
        filter: &ActivityFilter,
    ) -> AppResult<Vec<activity::Model>> {
        let mut query = Activity::find().order_by_desc(activity::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(activity::Column::Id.lt(id));
        }
        if let Some(ref url_type) = filter.url_type {
            query = query.filter(activity::Column::UrlType.eq(url_type));
        }
        if let Some(ref source) = filter.source {
            query = query.filter(activity::Column::Source.eq(source));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Fetch a batch of activities by id.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<activity::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Activity::find()
            .filter(activity::Column::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
