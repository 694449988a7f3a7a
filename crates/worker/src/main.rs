//! Curio feed worker entry point.
//!
//! Consumes domain events from the Redis-backed queues and runs the
//! activity distribution pipeline: dedup, activity creation, follower
//! resolution, and fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use curio_common::Config;
use curio_core::{ActivityFeedService, EventKind, FanOutWriter, FollowerResolver};
use curio_db::repositories::{ActivityRepository, FeedEntryRepository, FollowRepository};
use curio_queue::{
    Dispatcher, EventJob, EventSubscriber, FeedActivityHandler, QueueName, QueueSettings,
    RedisLock, RetryConfig, RoutingTable,
};
use fred::interfaces::ClientLike;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curio=debug".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    info!("Starting curio worker...");

    // Load configuration
    let config = Config::load()?;

    // Routing must be complete before anything consumes or publishes
    let routing = RoutingTable::standard();
    routing.validate()?;

    // Connect to database
    let db = Arc::new(curio_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    curio_db::migrate(&db).await?;
    info!("Migrations completed");

    // Connect to Redis and initialize per-queue job storage
    info!("Connecting to Redis...");
    let redis_client =
        redis::Client::open(config.redis.url.as_str()).expect("Failed to create Redis client");
    let redis_conn = redis::aio::ConnectionManager::new(redis_client)
        .await
        .expect("Failed to connect to Redis");

    let mut storages = HashMap::new();
    for queue in QueueName::ALL {
        let queue_config = apalis_redis::Config::default().set_namespace(&queue.namespace());
        let storage = apalis_redis::RedisStorage::<EventJob>::new_with_config(
            redis_conn.clone(),
            queue_config,
        );
        storages.insert(queue, storage);
    }
    info!("Connected to Redis job queues");

    // Initialize fred client for the distributed activity lock
    let fred_config = fred::types::config::Config::from_url(&config.redis.url)
        .expect("Failed to parse Redis URL for lock client");
    let fred_client = fred::clients::Client::new(fred_config, None, None, None);
    fred_client.connect();
    fred_client
        .wait_for_connect()
        .await
        .expect("Failed to connect fred client to Redis");
    let fred_client = Arc::new(fred_client);
    info!("Connected to Redis for distributed locking");

    // Wire the pipeline
    let activity_repo = ActivityRepository::new(db.clone());
    let follow_repo = FollowRepository::new(db.clone());
    let feed_entry_repo = FeedEntryRepository::new(db.clone());

    let feed_service = ActivityFeedService::with_config(
        activity_repo,
        FollowerResolver::new(follow_repo),
        FanOutWriter::new(feed_entry_repo),
        Arc::new(RedisLock::new(fred_client)),
        &config.feed,
    );

    // Feed queue: the activity pipeline
    let feed_settings = QueueSettings::from(&config.queues.feed);
    let mut feed_dispatcher = Dispatcher::new(RetryConfig::from(&feed_settings));
    feed_dispatcher.set_verbose(config.feed.verbose_event_logging);
    feed_dispatcher.subscribe(
        EventKind::CardCollected,
        Arc::new(FeedActivityHandler::new(feed_service)),
    );

    // Search queue: consumed here so jobs drain, indexed elsewhere
    let search_settings = QueueSettings::from(&config.queues.search);
    let search_dispatcher = Dispatcher::new(RetryConfig::from(&search_settings));

    let mut handles = Vec::new();
    for (queue, dispatcher, settings) in [
        (QueueName::Feed, feed_dispatcher, &feed_settings),
        (QueueName::Search, search_dispatcher, &search_settings),
    ] {
        let storage = storages
            .get(&queue)
            .expect("storage exists for every queue")
            .clone();
        let subscriber =
            EventSubscriber::new(queue, storage, Arc::new(dispatcher), settings.concurrency);
        handles.push(subscriber.start());
        info!(queue = %queue, concurrency = settings.concurrency, "Started queue workers");
    }

    shutdown_signal().await;

    for handle in handles {
        handle.abort();
    }

    info!("Worker shutdown complete");
    Ok(())
}
