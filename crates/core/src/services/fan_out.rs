//! Fan-out writer.
//!
//! The only component allowed to write feed entries. Appends one row per
//! recipient in a single bulk statement; duplicate `(recipient, activity)`
//! pairs are skipped by the store, so re-running a fan-out is safe.

use chrono::{DateTime, Utc};
use curio_common::{AppResult, IdGenerator};
use curio_db::{entities::feed_entry, repositories::FeedEntryRepository};
use sea_orm::Set;
use std::collections::BTreeSet;
use tracing::debug;

/// Idempotent writer for per-user feed partitions.
#[derive(Clone)]
pub struct FanOutWriter {
    feed_entry_repo: FeedEntryRepository,
    id_gen: IdGenerator,
}

impl FanOutWriter {
    /// Create a new fan-out writer.
    #[must_use]
    pub fn new(feed_entry_repo: FeedEntryRepository) -> Self {
        Self {
            feed_entry_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Append `activity_id` to each recipient's feed. Returns the number of
    /// rows actually written (already-delivered pairs are not counted).
    ///
    /// An empty recipient set is a no-op.
    pub async fn fan_out<I>(
        &self,
        activity_id: &str,
        recipient_ids: I,
        activity_created_at: DateTime<Utc>,
    ) -> AppResult<u64>
    where
        I: IntoIterator<Item = String>,
    {
        // BTreeSet drops duplicate recipients and makes the insert order
        // deterministic.
        let recipients: BTreeSet<String> = recipient_ids.into_iter().collect();
        if recipients.is_empty() {
            return Ok(0);
        }

        let batch_size = recipients.len();
        let models: Vec<feed_entry::ActiveModel> = recipients
            .into_iter()
            .map(|recipient_id| feed_entry::ActiveModel {
                id: Set(self.id_gen.generate()),
                recipient_id: Set(recipient_id),
                activity_id: Set(activity_id.to_string()),
                created_at: Set(activity_created_at.into()),
            })
            .collect();

        let written = self.feed_entry_repo.insert_many(models).await?;

        debug!(
            activity_id = %activity_id,
            recipients = batch_size,
            written,
            "Fanned out activity"
        );

        Ok(written)
    }
}
