//! Follower resolver.
//!
//! Computes the recipient set for a fan-out: everyone following the actor,
//! plus everyone following any of the collections the activity touches.

use curio_common::AppResult;
use curio_db::{entities::follow::FollowTargetType, repositories::FollowRepository};
use std::collections::HashSet;

/// Resolves the deduplicated recipient set for an activity.
#[derive(Clone)]
pub struct FollowerResolver {
    follow_repo: FollowRepository,
}

impl FollowerResolver {
    /// Create a new follower resolver.
    #[must_use]
    pub const fn new(follow_repo: FollowRepository) -> Self {
        Self { follow_repo }
    }

    /// Union of the actor's followers and the collections' followers.
    ///
    /// Both lookups run concurrently; a user following the actor and one of
    /// the collections appears once. Empty inputs yield an empty set.
    pub async fn resolve(
        &self,
        actor_id: &str,
        collection_ids: &[String],
    ) -> AppResult<HashSet<String>> {
        let (actor_followers, collection_followers) = tokio::try_join!(
            self.follow_repo
                .find_followers(actor_id, FollowTargetType::User),
            self.follow_repo.find_followers_of_collections(collection_ids),
        )?;

        let mut recipients = HashSet::new();
        for follow in actor_followers {
            recipients.insert(follow.follower_id);
        }
        for follow in collection_followers {
            recipients.insert(follow.follower_id);
        }
        Ok(recipients)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use curio_db::entities::follow;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn follow_row(id: &str, follower: &str, target: &str, tt: FollowTargetType) -> follow::Model {
        follow::Model {
            id: id.to_string(),
            follower_id: follower.to_string(),
            target_id: target.to_string(),
            target_type: tt,
            published_record_id: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_union_deduplicates_shared_follower() {
        // user2 follows both the actor and col1: one recipient entry.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([
                    vec![
                        follow_row("f1", "user2", "actor", FollowTargetType::User),
                        follow_row("f2", "user3", "actor", FollowTargetType::User),
                    ],
                    vec![follow_row(
                        "f3",
                        "user2",
                        "col1",
                        FollowTargetType::Collection,
                    )],
                ])
                .into_connection(),
        );

        let resolver = FollowerResolver::new(FollowRepository::new(db));
        let recipients = resolver
            .resolve("actor", &["col1".to_string()])
            .await
            .unwrap();

        assert_eq!(recipients.len(), 2);
        assert!(recipients.contains("user2"));
        assert!(recipients.contains("user3"));
    }

    #[tokio::test]
    async fn test_no_collections_queries_only_actor_followers() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![follow_row(
                    "f1",
                    "user2",
                    "actor",
                    FollowTargetType::User,
                )]])
                .into_connection(),
        );

        let resolver = FollowerResolver::new(FollowRepository::new(db));
        let recipients = resolver.resolve("actor", &[]).await.unwrap();

        assert_eq!(recipients.len(), 1);
        assert!(recipients.contains("user2"));
    }

    #[tokio::test]
    async fn test_empty_result_is_valid() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow::Model>::new()])
                .into_connection(),
        );

        let resolver = FollowerResolver::new(FollowRepository::new(db));
        let recipients = resolver.resolve("actor", &[]).await.unwrap();

        assert!(recipients.is_empty());
    }
}
