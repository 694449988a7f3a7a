//! Activity feed service.
//!
//! Turns incoming card events into canonical activities and distributes
//! them to follower feeds. Duplicate deliveries of the same event collapse
//! into one activity via a recency window; the race between two concurrent
//! handlers is closed by a short-lived distributed lock around the
//! check-then-create section.

use crate::services::fan_out::FanOutWriter;
use crate::services::follower_resolver::FollowerResolver;
use crate::services::lock::LockService;
use chrono::{DateTime, Utc};
use curio_common::{AppError, AppResult, FeedConfig, IdGenerator};
use curio_db::{
    entities::{activity, activity::ActivityKind},
    repositories::ActivityRepository,
};
use sea_orm::Set;
use std::time::Duration;
use tracing::{debug, warn};

/// Input for recording a card-collected activity.
#[derive(Debug, Clone)]
pub struct CardCollectedInput {
    /// User who collected the card.
    pub actor_id: String,
    /// The collected card.
    pub card_id: String,
    /// Collections the card was placed into, possibly empty.
    pub collection_ids: Vec<String>,
    /// URL classification of the card, if known.
    pub url_type: Option<String>,
    /// Where the collect originated.
    pub source: Option<String>,
    /// When the card itself was created.
    pub card_created_at: Option<DateTime<Utc>>,
    /// When the triggering event occurred.
    pub occurred_at: DateTime<Utc>,
}

/// Activity feed service for business logic.
#[derive(Clone)]
pub struct ActivityFeedService {
    activity_repo: ActivityRepository,
    resolver: FollowerResolver,
    fan_out: FanOutWriter,
    lock: LockService,
    dedup_window: Duration,
    lock_ttl: Duration,
    lock_acquire_attempts: u32,
    id_gen: IdGenerator,
}

impl ActivityFeedService {
    /// Create a new activity feed service with default tuning.
    #[must_use]
    pub fn new(
        activity_repo: ActivityRepository,
        resolver: FollowerResolver,
        fan_out: FanOutWriter,
        lock: LockService,
    ) -> Self {
        Self {
            activity_repo,
            resolver,
            fan_out,
            lock,
            dedup_window: Duration::from_secs(120),
            lock_ttl: Duration::from_secs(10),
            lock_acquire_attempts: 5,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a service tuned from configuration.
    #[must_use]
    pub fn with_config(
        activity_repo: ActivityRepository,
        resolver: FollowerResolver,
        fan_out: FanOutWriter,
        lock: LockService,
        config: &FeedConfig,
    ) -> Self {
        let mut service = Self::new(activity_repo, resolver, fan_out, lock);
        service.dedup_window = config.dedup_window();
        service.lock_ttl = config.lock_ttl();
        service.lock_acquire_attempts = config.lock_acquire_attempts;
        service
    }

    /// Record a card-collected activity, collapsing duplicates inside the
    /// dedup window.
    ///
    /// A repeated `(actor, card)` pair within the window merges its
    /// collection ids into the existing activity instead of creating a
    /// second one. Outside the window a fresh activity is created.
    pub async fn add_card_collected(
        &self,
        input: &CardCollectedInput,
    ) -> AppResult<activity::Model> {
        let since = Utc::now()
            - chrono::TimeDelta::from_std(self.dedup_window)
                .map_err(|e| AppError::Internal(e.to_string()))?;

        // Fast path: an activity already exists inside the window.
        if let Some(existing) = self
            .activity_repo
            .find_recent_by_actor_card(&input.actor_id, &input.card_id, since)
            .await?
        {
            return self.merge_collections(existing, &input.collection_ids).await;
        }

        // Slow path: lock, re-check, create. Two concurrent handlers can
        // both miss the lookup above; only one gets to create.
        let token = self.acquire_with_retry(&input.actor_id, &input.card_id).await?;
        let result = self.check_and_create(input, since).await;
        let key = Self::lock_key(&input.actor_id, &input.card_id);
        if let Err(e) = self.lock.release(&key, &token).await {
            // The lock expires on its own; a failed release only delays
            // the next holder.
            warn!(key = %key, error = %e, "Failed to release activity lock");
        }
        result
    }

    /// Distribute an activity to all follower feeds. Returns the number of
    /// feed rows written.
    ///
    /// Safe to call repeatedly for the same activity; already-delivered
    /// recipients are skipped by the store.
    pub async fn distribute(&self, activity: &activity::Model) -> AppResult<u64> {
        let collection_ids = activity.collection_id_list();
        let recipients = self
            .resolver
            .resolve(&activity.actor_id, &collection_ids)
            .await?;

        if recipients.is_empty() {
            debug!(activity_id = %activity.id, "No recipients, skipping fan-out");
            return Ok(0);
        }

        self.fan_out
            .fan_out(&activity.id, recipients, activity.created_at.to_utc())
            .await
    }

    async fn check_and_create(
        &self,
        input: &CardCollectedInput,
        since: DateTime<Utc>,
    ) -> AppResult<activity::Model> {
        if let Some(existing) = self
            .activity_repo
            .find_recent_by_actor_card(&input.actor_id, &input.card_id, since)
            .await?
        {
            return self.merge_collections(existing, &input.collection_ids).await;
        }

        let model = activity::ActiveModel {
            id: Set(self.id_gen.generate()),
            actor_id: Set(input.actor_id.clone()),
            kind: Set(ActivityKind::CardCollected),
            card_id: Set(input.card_id.clone()),
            collection_ids: Set(serde_json::json!(input.collection_ids)),
            url_type: Set(input.url_type.clone()),
            source: Set(input.source.clone()),
            created_at: Set(Self::infer_created_at(input).into()),
        };

        let created = self.activity_repo.create(model).await?;
        debug!(
            activity_id = %created.id,
            actor_id = %created.actor_id,
            card_id = %created.card_id,
            "Created activity"
        );
        Ok(created)
    }

    /// Union the incoming collection ids into an existing activity.
    async fn merge_collections(
        &self,
        mut existing: activity::Model,
        incoming: &[String],
    ) -> AppResult<activity::Model> {
        let mut merged = existing.collection_id_list();
        let mut changed = false;
        for id in incoming {
            if !merged.contains(id) {
                merged.push(id.clone());
                changed = true;
            }
        }

        if changed {
            self.activity_repo
                .set_collection_ids(&existing.id, &merged)
                .await?;
            existing.collection_ids = serde_json::json!(merged);
            debug!(activity_id = %existing.id, "Merged collection ids into existing activity");
        }

        Ok(existing)
    }

    async fn acquire_with_retry(&self, actor_id: &str, card_id: &str) -> AppResult<String> {
        let key = Self::lock_key(actor_id, card_id);
        for attempt in 1..=self.lock_acquire_attempts {
            if let Some(token) = self.lock.acquire(&key, self.lock_ttl).await? {
                return Ok(token);
            }
            if attempt < self.lock_acquire_attempts {
                tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
            }
        }
        Err(AppError::Lock(format!(
            "Could not acquire lock {key} after {} attempts",
            self.lock_acquire_attempts
        )))
    }

    fn lock_key(actor_id: &str, card_id: &str) -> String {
        format!("activity:card-collected:{actor_id}:{card_id}")
    }

    /// Library-only collects inherit the card's own creation time so
    /// historical imports sort where they belong; collection adds use the
    /// event's occurrence time.
    fn infer_created_at(input: &CardCollectedInput) -> DateTime<Utc> {
        if input.collection_ids.is_empty()
            && let Some(card_created_at) = input.card_created_at
        {
            return card_created_at;
        }
        input.occurred_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::lock::{DistributedLock, InMemoryLock};
    use async_trait::async_trait;
    use curio_db::repositories::{FeedEntryRepository, FollowRepository};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: Arc<DatabaseConnection>, lock: LockService) -> ActivityFeedService {
        ActivityFeedService::new(
            ActivityRepository::new(db.clone()),
            FollowerResolver::new(FollowRepository::new(db.clone())),
            FanOutWriter::new(FeedEntryRepository::new(db)),
            lock,
        )
    }

    fn input(collection_ids: Vec<&str>) -> CardCollectedInput {
        CardCollectedInput {
            actor_id: "actor".to_string(),
            card_id: "card1".to_string(),
            collection_ids: collection_ids.into_iter().map(String::from).collect(),
            url_type: None,
            source: None,
            card_created_at: None,
            occurred_at: Utc::now(),
        }
    }

    fn existing_activity(collection_ids: Vec<&str>) -> activity::Model {
        activity::Model {
            id: "a1".to_string(),
            actor_id: "actor".to_string(),
            kind: ActivityKind::CardCollected,
            card_id: "card1".to_string(),
            collection_ids: serde_json::json!(collection_ids),
            url_type: None,
            source: None,
            created_at: Utc::now().into(),
        }
    }

    /// A lock that is always held by someone else.
    #[derive(Clone, Default)]
    struct AlwaysHeldLock;

    #[async_trait]
    impl DistributedLock for AlwaysHeldLock {
        async fn acquire(&self, _key: &str, _ttl: Duration) -> AppResult<Option<String>> {
            Ok(None)
        }

        async fn release(&self, _key: &str, _token: &str) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dedup_hit_merges_collection_ids() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing_activity(vec![])]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let svc = service(db, Arc::new(InMemoryLock::new()));

        let result = svc.add_card_collected(&input(vec!["col1"])).await.unwrap();

        assert_eq!(result.id, "a1");
        assert_eq!(result.collection_id_list(), vec!["col1".to_string()]);
    }

    #[tokio::test]
    async fn test_dedup_hit_without_new_collections_skips_update() {
        // No exec results appended: an UPDATE would fail the mock.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing_activity(vec!["col1"])]])
                .into_connection(),
        );
        let svc = service(db, Arc::new(InMemoryLock::new()));

        let result = svc.add_card_collected(&input(vec!["col1"])).await.unwrap();

        assert_eq!(result.collection_id_list(), vec!["col1".to_string()]);
    }

    #[tokio::test]
    async fn test_dedup_miss_creates_under_lock() {
        let created = existing_activity(vec!["col1"]);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // First lookup misses, re-check under the lock misses,
                // then the insert returns the new row.
                .append_query_results([
                    Vec::<activity::Model>::new(),
                    Vec::<activity::Model>::new(),
                ])
                .append_query_results([[created]])
                .into_connection(),
        );
        let svc = service(db, Arc::new(InMemoryLock::new()));

        let result = svc.add_card_collected(&input(vec!["col1"])).await.unwrap();

        assert_eq!(result.id, "a1");
    }

    #[tokio::test]
    async fn test_recheck_under_lock_finds_concurrent_create() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                // First lookup misses; the re-check finds the row another
                // handler created while we waited for the lock.
                .append_query_results([
                    Vec::<activity::Model>::new(),
                    vec![existing_activity(vec!["col1"])],
                ])
                .into_connection(),
        );
        let svc = service(db, Arc::new(InMemoryLock::new()));

        let result = svc.add_card_collected(&input(vec!["col1"])).await.unwrap();

        assert_eq!(result.id, "a1");
    }

    #[tokio::test]
    async fn test_lock_contention_is_an_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<activity::Model>::new()])
                .into_connection(),
        );
        let mut svc = service(db, Arc::new(AlwaysHeldLock));
        svc.lock_acquire_attempts = 2;

        let err = svc.add_card_collected(&input(vec![])).await.unwrap_err();

        assert!(matches!(err, AppError::Lock(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_distribute_resolves_and_fans_out() {
        use curio_db::entities::follow::{self, FollowTargetType};

        let follower = follow::Model {
            id: "f1".to_string(),
            follower_id: "user2".to_string(),
            target_id: "actor".to_string(),
            target_type: FollowTargetType::User,
            published_record_id: None,
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([
                    vec![follower],
                    Vec::<follow::Model>::new(),
                ])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let svc = service(db, Arc::new(InMemoryLock::new()));

        let written = svc
            .distribute(&existing_activity(vec!["col1"]))
            .await
            .unwrap();

        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_distribute_without_recipients_is_a_noop() {
        use curio_db::entities::follow;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow::Model>::new()])
                .into_connection(),
        );
        let svc = service(db, Arc::new(InMemoryLock::new()));

        let written = svc.distribute(&existing_activity(vec![])).await.unwrap();

        assert_eq!(written, 0);
    }

    #[test]
    fn test_created_at_inference() {
        let card_time = Utc::now() - chrono::TimeDelta::days(30);

        // Library-only collect with a known card time uses the card time
        let mut library_only = input(vec![]);
        library_only.card_created_at = Some(card_time);
        assert_eq!(
            ActivityFeedService::infer_created_at(&library_only),
            card_time
        );

        // Collection adds use the event occurrence time
        let mut collection_add = input(vec!["col1"]);
        collection_add.card_created_at = Some(card_time);
        assert_eq!(
            ActivityFeedService::infer_created_at(&collection_add),
            collection_add.occurred_at
        );

        // No card time falls back to occurrence time
        let plain = input(vec![]);
        assert_eq!(
            ActivityFeedService::infer_created_at(&plain),
            plain.occurred_at
        );
    }
}
