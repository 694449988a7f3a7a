//! Feed entry repository.
//!
//! The fan-out store. Writes go through [`FeedEntryRepository::insert_many`]
//! only; everything else in the system reads.

use std::sync::Arc;

use crate::entities::{FeedEntry, feed_entry};
use curio_common::{AppError, AppResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Feed entry repository for database operations.
#[derive(Clone)]
pub struct FeedEntryRepository {
    db: Arc<DatabaseConnection>,
}

impl FeedEntryRepository {
    /// Create a new feed entry repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Bulk-insert fan-out rows, silently skipping `(recipient, activity)`
    /// pairs that already exist. Returns the number of rows actually written.
    ///
    /// An empty batch is a no-op that issues no statement.
    pub async fn insert_many(&self, models: Vec<feed_entry::ActiveModel>) -> AppResult<u64> {
        if models.is_empty() {
            return Ok(0);
        }

        FeedEntry::insert_many(models)
            .on_conflict(
                OnConflict::columns([
                    feed_entry::Column::RecipientId,
                    feed_entry::Column::ActivityId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Following-feed page for one recipient: newest first, cursor on
    /// activity id.
    pub async fn find_page(
        &self,
        recipient_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<feed_entry::Model>> {
        let mut query = FeedEntry::find()
            .filter(feed_entry::Column::RecipientId.eq(recipient_id))
            .order_by_desc(feed_entry::Column::ActivityId);

        if let Some(id) = until_id {
            query = query.filter(feed_entry::Column::ActivityId.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_entry(id: &str, recipient_id: &str, activity_id: &str) -> feed_entry::Model {
        feed_entry::Model {
            id: id.to_string(),
            recipient_id: recipient_id.to_string(),
            activity_id: activity_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn active(id: &str, recipient_id: &str, activity_id: &str) -> feed_entry::ActiveModel {
        feed_entry::ActiveModel {
            id: Set(id.to_string()),
            recipient_id: Set(recipient_id.to_string()),
            activity_id: Set(activity_id.to_string()),
            created_at: Set(Utc::now().into()),
        }
    }

    #[tokio::test]
    async fn test_insert_many_empty_issues_no_statement() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let repo = FeedEntryRepository::new(Arc::new(db));

        let written = repo.insert_many(Vec::new()).await.unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_insert_many_reports_rows_written() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );
        let repo = FeedEntryRepository::new(db);

        let written = repo
            .insert_many(vec![active("e1", "u1", "a1"), active("e2", "u2", "a1")])
            .await
            .unwrap();

        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn test_insert_many_conflicts_count_as_skipped() {
        // The backend reports only the rows actually inserted; conflicting
        // pairs disappear from the count instead of erroring.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let repo = FeedEntryRepository::new(db);

        let written = repo
            .insert_many(vec![active("e1", "u1", "a1"), active("e2", "u1", "a1")])
            .await
            .unwrap();

        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_find_page() {
        let e1 = create_test_entry("e2", "u1", "a2");
        let e2 = create_test_entry("e1", "u1", "a1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[e1, e2]])
                .into_connection(),
        );

        let repo = FeedEntryRepository::new(db);
        let result = repo.find_page("u1", 10, None).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].activity_id, "a2");
    }
}
