//! Distributed lock abstraction.
//!
//! Used to serialize concurrent writes to the same dedup key. The Redis
//! implementation lives in the queue crate; tests and single-process
//! deployments can use [`InMemoryLock`].

use async_trait::async_trait;
use curio_common::{AppResult, IdGenerator};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Trait for mutual exclusion across workers.
///
/// `acquire` is non-blocking: it returns a release token when the lock was
/// taken and `None` when another holder has it. Locks expire on their own
/// after `ttl` so a crashed holder cannot wedge the key.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock. Returns a token to release with, or `None`
    /// if the lock is currently held.
    async fn acquire(&self, key: &str, ttl: Duration) -> AppResult<Option<String>>;

    /// Release the lock, but only if `token` still owns it.
    async fn release(&self, key: &str, token: &str) -> AppResult<()>;
}

/// Wrapper for boxed `DistributedLock` trait object.
pub type LockService = Arc<dyn DistributedLock>;

/// Process-local lock backed by a map. Honors the same token and expiry
/// semantics as the Redis implementation.
#[derive(Clone, Default)]
pub struct InMemoryLock {
    held: Arc<Mutex<HashMap<String, (String, Instant)>>>,
    id_gen: IdGenerator,
}

impl InMemoryLock {
    /// Create a new in-memory lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn acquire(&self, key: &str, ttl: Duration) -> AppResult<Option<String>> {
        let mut held = self.held.lock().await;
        let now = Instant::now();

        if let Some((_, expires_at)) = held.get(key)
            && *expires_at > now
        {
            return Ok(None);
        }

        let token = self.id_gen.generate_token();
        held.insert(key.to_string(), (token.clone(), now + ttl));
        Ok(Some(token))
    }

    async fn release(&self, key: &str, token: &str) -> AppResult<()> {
        let mut held = self.held.lock().await;
        if let Some((owner, _)) = held.get(key)
            && owner == token
        {
            held.remove(key);
        }
        Ok(())
    }
}
