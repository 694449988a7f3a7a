//! Event dispatcher.
//!
//! Routes a received event to every handler subscribed to its kind and
//! owns the in-process retry policy. A kind with no subscribers is
//! consumed silently so one queue can carry kinds that only another
//! deployment cares about.

use async_trait::async_trait;
use curio_common::{AppError, AppResult};
use curio_core::{DomainEvent, EventKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::retry::{DeadLetterEntry, RetryConfig};

/// Trait for handling one kind of domain event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process a single event. Errors are retried or dead-lettered
    /// according to [`AppError::is_retryable`] and the retry policy.
    async fn handle(&self, event: &DomainEvent) -> AppResult<()>;
}

/// Wrapper for boxed `EventHandler` trait object.
pub type EventHandlerService = Arc<dyn EventHandler>;

/// Per-queue event dispatcher.
pub struct Dispatcher {
    handlers: HashMap<EventKind, Vec<EventHandlerService>>,
    retry: RetryConfig,
    verbose: bool,
}

impl Dispatcher {
    /// Create a dispatcher with the given retry policy.
    #[must_use]
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            retry,
            verbose: false,
        }
    }

    /// Log every dispatched event at info level.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Subscribe a handler to an event kind.
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandlerService) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Dispatch one event to all of its subscribers.
    ///
    /// Returns the first exhausted handler error; the queue layer turns
    /// that into a failed job.
    pub async fn dispatch(&self, event: &DomainEvent) -> AppResult<()> {
        let Some(handlers) = self.handlers.get(&event.kind) else {
            debug!(kind = %event.kind, aggregate_id = %event.aggregate_id, "No handlers for event");
            return Ok(());
        };

        if self.verbose {
            info!(
                kind = %event.kind,
                aggregate_id = %event.aggregate_id,
                handlers = handlers.len(),
                "Dispatching event"
            );
        }

        for handler in handlers {
            self.run_with_retry(handler.as_ref(), event).await?;
        }

        Ok(())
    }

    async fn run_with_retry(&self, handler: &dyn EventHandler, event: &DomainEvent) -> AppResult<()> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match handler.handle(event).await {
                Ok(()) => return Ok(()),
                // The aggregate is gone; re-running will never find it.
                Err(AppError::NotFound(msg)) => {
                    warn!(
                        kind = %event.kind,
                        aggregate_id = %event.aggregate_id,
                        reason = %msg,
                        "Skipping event for missing aggregate"
                    );
                    return Ok(());
                }
                Err(e) if e.is_retryable() && self.retry.should_retry(attempts) => {
                    let delay = self.retry.delay_for_attempt(attempts);
                    warn!(
                        kind = %event.kind,
                        aggregate_id = %event.aggregate_id,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Event handler failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let entry = DeadLetterEntry::new(event.clone(), attempts, e.to_string());
                    let reason = if e.is_retryable() {
                        "Event handler exhausted retries, dead-lettering"
                    } else {
                        "Event handler failed permanently, dead-lettering"
                    };
                    error!(
                        kind = %event.kind,
                        aggregate_id = %event.aggregate_id,
                        attempts = entry.attempts,
                        last_error = %entry.last_error,
                        failed_at = %entry.failed_at,
                        "{reason}"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use curio_core::{CardCollectedPayload, DomainEvent};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn event() -> DomainEvent {
        let payload = CardCollectedPayload {
            actor_id: "u1".to_string(),
            card_id: "c1".to_string(),
            collection_ids: vec![],
            url_type: None,
            source: None,
            card_created_at: None,
        };
        DomainEvent::card_collected(&payload).unwrap()
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyHandler {
        calls: AtomicU32,
        failures: u32,
        error: fn(String) -> AppError,
    }

    impl FlakyHandler {
        fn new(failures: u32, error: fn(String) -> AppError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                error,
            }
        }
    }

    #[async_trait]
    impl EventHandler for FlakyHandler {
        async fn handle(&self, _event: &DomainEvent) -> AppResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)("transient".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_no_handlers_is_silent() {
        let dispatcher = Dispatcher::new(fast_retry(3));
        dispatcher.dispatch(&event()).await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let mut dispatcher = Dispatcher::new(fast_retry(3));
        let handler = Arc::new(FlakyHandler::new(1, AppError::Database));
        dispatcher.subscribe(EventKind::CardCollected, handler.clone());

        dispatcher.dispatch(&event()).await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_dispatch() {
        let mut dispatcher = Dispatcher::new(fast_retry(3));
        let handler = Arc::new(FlakyHandler::new(10, AppError::Database));
        dispatcher.subscribe(EventKind::CardCollected, handler.clone());

        let err = dispatcher.dispatch(&event()).await.unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let mut dispatcher = Dispatcher::new(fast_retry(5));
        let handler = Arc::new(FlakyHandler::new(10, AppError::Validation));
        dispatcher.subscribe(EventKind::CardCollected, handler.clone());

        let err = dispatcher.dispatch(&event()).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_aggregate_is_a_skip() {
        let mut dispatcher = Dispatcher::new(fast_retry(5));
        let handler = Arc::new(FlakyHandler::new(10, AppError::NotFound));
        dispatcher.subscribe(EventKind::CardCollected, handler.clone());

        dispatcher.dispatch(&event()).await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_subscribers_run() {
        let mut dispatcher = Dispatcher::new(fast_retry(3));
        let first = Arc::new(FlakyHandler::new(0, AppError::Database));
        let second = Arc::new(FlakyHandler::new(0, AppError::Database));
        dispatcher.subscribe(EventKind::CardCollected, first.clone());
        dispatcher.subscribe(EventKind::CardCollected, second.clone());

        dispatcher.dispatch(&event()).await.unwrap();

        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }
}
