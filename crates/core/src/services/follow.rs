//! Follow service.
//!
//! Manages follow edges for users and collections. Publishing the follow
//! as an external record is best-effort: the local edge is the source of
//! truth, and a failed publish leaves the row unpublished rather than
//! rolling it back. Authentication failures are the exception, since the
//! caller must re-authenticate before anything else will succeed.

use async_trait::async_trait;
use curio_common::{AppError, AppResult, IdGenerator};
use curio_db::{
    entities::{follow, follow::FollowTargetType},
    repositories::FollowRepository,
};
use sea_orm::Set;
use std::sync::Arc;
use tracing::warn;

/// Trait for publishing follow edges to an external record store.
#[async_trait]
pub trait RecordPublisher: Send + Sync {
    /// Publish a follow edge. Returns the external record id.
    async fn publish_follow(&self, follow: &follow::Model) -> AppResult<String>;

    /// Remove a previously published record.
    async fn unpublish(&self, record_id: &str) -> AppResult<()>;
}

/// A no-op implementation of `RecordPublisher` for testing or when external
/// publishing is disabled.
#[derive(Clone, Default)]
pub struct NoOpRecordPublisher;

#[async_trait]
impl RecordPublisher for NoOpRecordPublisher {
    async fn publish_follow(&self, follow: &follow::Model) -> AppResult<String> {
        Ok(format!("noop:{}", follow.id))
    }

    async fn unpublish(&self, _record_id: &str) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `RecordPublisher` trait object.
pub type RecordPublisherService = Arc<dyn RecordPublisher>;

/// Follow service for business logic.
#[derive(Clone)]
pub struct FollowService {
    follow_repo: FollowRepository,
    publisher: Option<RecordPublisherService>,
    id_gen: IdGenerator,
}

impl FollowService {
    /// Create a new follow service without external publishing.
    #[must_use]
    pub fn new(follow_repo: FollowRepository) -> Self {
        Self {
            follow_repo,
            publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a new follow service with external record publishing.
    #[must_use]
    pub fn with_publisher(follow_repo: FollowRepository, publisher: RecordPublisherService) -> Self {
        Self {
            follow_repo,
            publisher: Some(publisher),
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the record publisher.
    pub fn set_publisher(&mut self, publisher: RecordPublisherService) {
        self.publisher = Some(publisher);
    }

    /// Follow a user or collection.
    ///
    /// Repeating an existing follow returns the existing edge instead of
    /// erroring, so retried requests converge on the same state.
    pub async fn follow(
        &self,
        follower_id: &str,
        target_id: &str,
        target_type: FollowTargetType,
    ) -> AppResult<follow::Model> {
        if target_type == FollowTargetType::User && follower_id == target_id {
            return Err(AppError::Validation("Cannot follow yourself".to_string()));
        }

        if let Some(existing) = self
            .follow_repo
            .find_by_key(follower_id, target_id, target_type)
            .await?
        {
            return Ok(existing);
        }

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower_id.to_string()),
            target_id: Set(target_id.to_string()),
            target_type: Set(target_type),
            published_record_id: Set(None),
            created_at: Set(chrono::Utc::now().into()),
        };
        let created = self.follow_repo.create(model).await?;

        if let Some(ref publisher) = self.publisher {
            match publisher.publish_follow(&created).await {
                Ok(record_id) => {
                    self.follow_repo
                        .mark_published(&created.id, &record_id)
                        .await?;
                }
                // The session is unusable; let the caller re-authenticate.
                Err(e @ AppError::AuthenticationRequired(_)) => return Err(e),
                Err(e) => {
                    // Local edge stands; the record can be republished later.
                    warn!(follow_id = %created.id, error = %e, "Failed to publish follow record");
                }
            }
        }

        Ok(created)
    }

    /// Remove a follow edge. Unknown edges are a no-op.
    pub async fn unfollow(
        &self,
        follower_id: &str,
        target_id: &str,
        target_type: FollowTargetType,
    ) -> AppResult<()> {
        let Some(existing) = self
            .follow_repo
            .find_by_key(follower_id, target_id, target_type)
            .await?
        else {
            return Ok(());
        };

        if let Some(ref publisher) = self.publisher
            && let Some(ref record_id) = existing.published_record_id
        {
            match publisher.unpublish(record_id).await {
                Ok(()) => {}
                Err(e @ AppError::AuthenticationRequired(_)) => return Err(e),
                Err(e) => {
                    warn!(follow_id = %existing.id, error = %e, "Failed to unpublish follow record");
                }
            }
        }

        self.follow_repo.delete(&existing.id).await
    }
}
