//! Background job queue for curio.
//!
//! Redis-backed distribution pipeline:
//!
//! - **Jobs**: domain event envelopes, one job per `(event, queue)` pair
//! - **Routing**: static `event kind -> queues` table, validated at startup
//! - **Workers**: competing consumers per queue with Apalis
//! - **Dispatcher**: per-queue handler registry with retry and dead-letter
//! - **Lock**: Redis advisory lock backing the activity dedup race

pub mod dispatcher;
pub mod handlers;
pub mod jobs;
pub mod lock_impl;
pub mod publisher;
pub mod retry;
pub mod routing;
pub mod workers;

pub use dispatcher::{Dispatcher, EventHandler, EventHandlerService};
pub use handlers::FeedActivityHandler;
pub use jobs::EventJob;
pub use lock_impl::RedisLock;
pub use publisher::RedisEventPublisher;
pub use retry::{DeadLetterEntry, RetryConfig};
pub use routing::{QueueName, QueueSettings, RoutingTable};
pub use workers::{DispatcherContext, EventSubscriber, event_worker};
