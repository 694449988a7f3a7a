//! Queue integration tests.
//!
//! These tests drive the dispatcher and the feed handler together over a
//! mocked store to verify the retry behavior the pipeline depends on.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use curio_core::{
    ActivityFeedService, CardCollectedPayload, DomainEvent, EventKind, FanOutWriter,
    FollowerResolver, InMemoryLock,
};
use curio_db::entities::{activity, activity::ActivityKind, follow};
use curio_db::repositories::{ActivityRepository, FeedEntryRepository, FollowRepository};
use curio_queue::{Dispatcher, FeedActivityHandler, QueueName, RetryConfig, RoutingTable};
use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult, RuntimeErr};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

fn feed_handler(db: Arc<DatabaseConnection>) -> FeedActivityHandler {
    FeedActivityHandler::new(ActivityFeedService::new(
        ActivityRepository::new(db.clone()),
        FollowerResolver::new(FollowRepository::new(db.clone())),
        FanOutWriter::new(FeedEntryRepository::new(db)),
        Arc::new(InMemoryLock::new()),
    ))
}

fn card_collected_event(collection_ids: Vec<&str>) -> DomainEvent {
    let payload = CardCollectedPayload {
        actor_id: "actor".to_string(),
        card_id: "card1".to_string(),
        collection_ids: collection_ids.into_iter().map(String::from).collect(),
        url_type: None,
        source: None,
        card_created_at: None,
    };
    DomainEvent::card_collected(&payload).unwrap()
}

fn activity_row(id: &str) -> activity::Model {
    activity::Model {
        id: id.to_string(),
        actor_id: "actor".to_string(),
        kind: ActivityKind::CardCollected,
        card_id: "card1".to_string(),
        collection_ids: serde_json::json!([]),
        url_type: None,
        source: None,
        created_at: Utc::now().into(),
    }
}

fn follower_row(follower: &str) -> follow::Model {
    follow::Model {
        id: format!("f-{follower}"),
        follower_id: follower.to_string(),
        target_id: "actor".to_string(),
        target_type: follow::FollowTargetType::User,
        published_record_id: None,
        created_at: Utc::now().into(),
    }
}

#[tokio::test]
async fn test_retry_converges_on_the_same_state() {
    // First attempt creates the activity but fails at fan-out; the retry
    // hits the dedup window, creates nothing new, and completes fan-out.
    let db = Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres)
            // attempt 1: dedup miss, re-check miss, insert returning
            .append_query_results([
                Vec::<activity::Model>::new(),
                Vec::<activity::Model>::new(),
            ])
            .append_query_results([[activity_row("a1")]])
            // attempt 1: follower lookup
            .append_query_results([[follower_row("user2")]])
            // attempt 1: fan-out insert fails
            .append_exec_errors([DbErr::Exec(RuntimeErr::Internal(
                "connection reset".to_string(),
            ))])
            // attempt 2: dedup hit, follower lookup, fan-out succeeds
            .append_query_results([[activity_row("a1")]])
            .append_query_results([[follower_row("user2")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection(),
    );

    let mut dispatcher = Dispatcher::new(fast_retry());
    dispatcher.subscribe(
        EventKind::CardCollected,
        Arc::new(feed_handler(db)),
    );

    dispatcher
        .dispatch(&card_collected_event(vec![]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_delivery_merges_instead_of_duplicating() {
    // Second delivery of the same fact lands inside the dedup window and
    // merges its collection ids into the first activity.
    let db = Arc::new(
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[activity_row("a1")]])
            // collection id merge
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            // follower lookups run concurrently; user followers first
            .append_query_results([
                vec![follower_row("user2")],
                Vec::<follow::Model>::new(),
            ])
            // fan-out
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection(),
    );

    let mut dispatcher = Dispatcher::new(fast_retry());
    dispatcher.subscribe(
        EventKind::CardCollected,
        Arc::new(feed_handler(db)),
    );

    dispatcher
        .dispatch(&card_collected_event(vec!["col1"]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_event_with_no_subscribers_is_consumed() {
    // The search queue runs the same dispatcher with zero feed handlers;
    // a card event must pass through without blocking or erroring.
    let dispatcher = Dispatcher::new(fast_retry());

    dispatcher
        .dispatch(&card_collected_event(vec![]))
        .await
        .unwrap();
}

#[test]
fn test_standard_routing_reaches_both_pipelines() {
    let table = RoutingTable::standard();
    table.validate().unwrap();

    assert!(
        table
            .queues_for(EventKind::CardCollected)
            .contains(&QueueName::Feed)
    );
    assert!(
        table
            .queues_for(EventKind::CardCollected)
            .contains(&QueueName::Search)
    );
}
