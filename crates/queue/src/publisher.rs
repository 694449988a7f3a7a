//! Redis-backed event publisher.
//!
//! Implements the core [`EventPublisher`] trait by pushing one job per
//! `(event, target queue)` pair onto apalis Redis storage. Publishing is
//! fire-and-forget relative to the write that raised the event: a failure
//! here is logged and surfaced, but the already-committed write stands.

use async_trait::async_trait;
use curio_common::{AppError, AppResult};
use curio_core::{DomainEvent, EventPublisher};
use std::collections::HashMap;

use crate::jobs::EventJob;
use crate::routing::{QueueName, RoutingTable};

/// Redis-backed event publisher.
#[derive(Clone, Debug)]
pub struct RedisEventPublisher {
    storages: HashMap<QueueName, apalis_redis::RedisStorage<EventJob>>,
    routing: RoutingTable,
}

impl RedisEventPublisher {
    /// Create a new publisher over per-queue storages.
    ///
    /// The routing table is validated eagerly so a misconfigured table
    /// fails at startup rather than on the first event.
    pub fn new(
        storages: HashMap<QueueName, apalis_redis::RedisStorage<EventJob>>,
        routing: RoutingTable,
    ) -> AppResult<Self> {
        routing.validate()?;
        for queue in routing.routed_queues() {
            if !storages.contains_key(&queue) {
                return Err(AppError::Config(format!(
                    "No storage configured for routed queue {queue}"
                )));
            }
        }
        Ok(Self { storages, routing })
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> AppResult<()> {
        use apalis::prelude::*;

        for event in events {
            for queue in self.routing.queues_for(event.kind) {
                let Some(storage) = self.storages.get(queue) else {
                    return Err(AppError::Queue(format!(
                        "No storage for queue {queue}"
                    )));
                };

                storage
                    .clone()
                    .push(EventJob::new(event.clone()))
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            kind = %event.kind,
                            aggregate_id = %event.aggregate_id,
                            queue = %queue,
                            error = %e,
                            "Failed to enqueue event"
                        );
                        AppError::Queue(format!("Failed to enqueue event: {e}"))
                    })?;

                tracing::debug!(
                    kind = %event.kind,
                    aggregate_id = %event.aggregate_id,
                    queue = %queue,
                    "Enqueued event"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_routed_queue_without_storage_fails_construction() {
        let err =
            RedisEventPublisher::new(HashMap::new(), RoutingTable::standard()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_incomplete_routing_fails_construction() {
        let err = RedisEventPublisher::new(HashMap::new(), RoutingTable::empty()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
