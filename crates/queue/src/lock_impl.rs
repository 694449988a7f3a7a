//! Redis-backed distributed lock.
//!
//! SET NX PX with a random token; release runs a small Lua script so only
//! the current holder can delete the key.

use async_trait::async_trait;
use curio_common::{AppError, AppResult, IdGenerator};
use curio_core::DistributedLock;
use fred::clients::Client as RedisClient;
use fred::interfaces::{KeysInterface, LuaInterface};
use fred::types::{Expiration, SetOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// Delete the key only while `token` still owns it.
const RELEASE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

/// Distributed lock over a fred Redis client.
#[derive(Clone)]
pub struct RedisLock {
    redis: Arc<RedisClient>,
    prefix: String,
    id_gen: IdGenerator,
}

impl RedisLock {
    /// Create a new Redis lock with the default key prefix.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            prefix: "curio:lock".to_string(),
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a new Redis lock with a custom key prefix.
    #[must_use]
    pub fn with_prefix(redis: Arc<RedisClient>, prefix: String) -> Self {
        Self {
            redis,
            prefix,
            id_gen: IdGenerator::new(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn acquire(&self, key: &str, ttl: Duration) -> AppResult<Option<String>> {
        let full_key = self.full_key(key);
        let token = self.id_gen.generate_token();
        let ttl_ms = i64::try_from(ttl.as_millis())
            .map_err(|_| AppError::Lock("Lock TTL out of range".to_string()))?;

        // NX returns None when another holder has the key
        let result: Option<String> = self
            .redis
            .set(
                full_key.clone(),
                token.clone(),
                Some(Expiration::PX(ttl_ms)),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        if result.is_some() {
            debug!(key = %full_key, "Acquired lock");
            Ok(Some(token))
        } else {
            debug!(key = %full_key, "Lock is held");
            Ok(None)
        }
    }

    async fn release(&self, key: &str, token: &str) -> AppResult<()> {
        let full_key = self.full_key(key);

        let deleted: i64 = self
            .redis
            .eval(
                RELEASE_SCRIPT,
                vec![full_key.clone()],
                vec![token.to_string()],
            )
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        if deleted == 0 {
            // Expired or taken over; nothing to do
            debug!(key = %full_key, "Lock was not held by this token");
        }
        Ok(())
    }
}
