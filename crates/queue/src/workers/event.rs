//! Event worker.

use apalis::prelude::*;
use std::sync::Arc;
use tracing::{debug, error};

use crate::dispatcher::Dispatcher;
use crate::jobs::EventJob;
use crate::routing::QueueName;

/// Context for the event worker.
#[derive(Clone)]
pub struct DispatcherContext {
    /// The dispatcher shared by every worker of one queue.
    pub dispatcher: Arc<Dispatcher>,
}

impl DispatcherContext {
    /// Create a new dispatcher context.
    #[must_use]
    pub const fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Worker function consuming event jobs.
///
/// # Errors
/// Returns an error when every subscribed handler exhausted its retries;
/// the queue then records the job as failed.
pub async fn event_worker(job: EventJob, ctx: Data<DispatcherContext>) -> Result<(), Error> {
    debug!(
        kind = %job.event.kind,
        aggregate_id = %job.event.aggregate_id,
        "Processing event job"
    );

    match ctx.dispatcher.dispatch(&job.event).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(
                kind = %job.event.kind,
                aggregate_id = %job.event.aggregate_id,
                error = %e,
                "Event job failed"
            );
            let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(e);
            Err(Error::Failed(boxed.into()))
        }
    }
}

/// One queue's worker pool.
///
/// Registers `concurrency` identical workers over the same storage so
/// jobs are consumed competitively, then runs them on a spawned monitor.
pub struct EventSubscriber {
    queue: QueueName,
    storage: apalis_redis::RedisStorage<EventJob>,
    dispatcher: Arc<Dispatcher>,
    concurrency: usize,
}

impl EventSubscriber {
    /// Create a subscriber for one queue.
    #[must_use]
    pub const fn new(
        queue: QueueName,
        storage: apalis_redis::RedisStorage<EventJob>,
        dispatcher: Arc<Dispatcher>,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            storage,
            dispatcher,
            concurrency,
        }
    }

    /// Start consuming. The returned handle aborts the pool when dropped
    /// by the caller's shutdown path.
    #[must_use]
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        let ctx = DispatcherContext::new(self.dispatcher);
        let queue = self.queue;

        tokio::spawn(async move {
            let mut monitor = Monitor::new();
            for i in 0..self.concurrency.max(1) {
                monitor = monitor.register(
                    WorkerBuilder::new(format!("{queue}-{i}"))
                        .data(ctx.clone())
                        .backend(self.storage.clone())
                        .build_fn(event_worker),
                );
            }

            if let Err(e) = monitor.run().await {
                error!(queue = %queue, error = %e, "Event worker pool failed");
            }
        })
    }
}
