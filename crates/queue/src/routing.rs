//! Static event routing.
//!
//! Maps each event kind to the named queues that must see it. The table is
//! built once at startup and validated so a newly added event kind cannot
//! silently fall through.

use curio_common::{AppError, AppResult, QueueTuning};
use curio_core::EventKind;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Named job queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    /// Feed distribution queue.
    Feed,
    /// Search indexing queue.
    Search,
}

impl QueueName {
    /// Every queue the system runs.
    pub const ALL: [Self; 2] = [Self::Feed, Self::Search];

    /// Short name used in worker names and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Search => "search",
        }
    }

    /// Redis key namespace for this queue's jobs.
    #[must_use]
    pub fn namespace(self) -> String {
        format!("curio:queue:{}", self.as_str())
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-queue execution settings.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Maximum delivery attempts per job.
    pub attempts: u32,
    /// Initial retry backoff.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Concurrent workers for this queue.
    pub concurrency: usize,
}

impl From<&QueueTuning> for QueueSettings {
    fn from(tuning: &QueueTuning) -> Self {
        Self {
            attempts: tuning.attempts,
            initial_backoff: Duration::from_millis(tuning.initial_backoff_ms),
            max_backoff: Duration::from_millis(tuning.max_backoff_ms),
            concurrency: tuning.concurrency,
        }
    }
}

/// Static `event kind -> queues` routing table.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: HashMap<EventKind, Vec<QueueName>>,
    /// Kinds deliberately not routed anywhere.
    unrouted: HashSet<EventKind>,
}

impl RoutingTable {
    /// The production routing table.
    ///
    /// Card collects feed both pipelines; removals only matter to the
    /// search index.
    #[must_use]
    pub fn standard() -> Self {
        let mut routes = HashMap::new();
        routes.insert(
            EventKind::CardCollected,
            vec![QueueName::Feed, QueueName::Search],
        );
        routes.insert(EventKind::CardRemoved, vec![QueueName::Search]);

        Self {
            routes,
            unrouted: HashSet::new(),
        }
    }

    /// Build an empty table for custom wiring.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
            unrouted: HashSet::new(),
        }
    }

    /// Route a kind to a queue.
    pub fn route(&mut self, kind: EventKind, queue: QueueName) -> &mut Self {
        self.routes.entry(kind).or_default().push(queue);
        self
    }

    /// Mark a kind as intentionally unrouted.
    pub fn ignore(&mut self, kind: EventKind) -> &mut Self {
        self.unrouted.insert(kind);
        self
    }

    /// Queues an event of this kind must reach.
    #[must_use]
    pub fn queues_for(&self, kind: EventKind) -> &[QueueName] {
        self.routes.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Every queue referenced by at least one route.
    #[must_use]
    pub fn routed_queues(&self) -> HashSet<QueueName> {
        self.routes.values().flatten().copied().collect()
    }

    /// Every kind must be either routed or explicitly ignored.
    pub fn validate(&self) -> AppResult<()> {
        for kind in EventKind::ALL {
            let routed = self
                .routes
                .get(&kind)
                .is_some_and(|queues| !queues.is_empty());
            if !routed && !self.unrouted.contains(&kind) {
                return Err(AppError::Config(format!(
                    "Event kind {kind} has no route and is not marked as ignored"
                )));
            }
        }
        Ok(())
    }
}
