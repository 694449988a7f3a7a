//! Domain event job.

use curio_core::DomainEvent;
use serde::{Deserialize, Serialize};

/// Job carrying one domain event to a queue's workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventJob {
    /// The event envelope.
    pub event: DomainEvent,
}

impl EventJob {
    /// Create a new event job.
    #[must_use]
    pub const fn new(event: DomainEvent) -> Self {
        Self { event }
    }
}
