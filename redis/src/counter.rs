//! Redis-backed campaign counter store.
//!
//! # Atomicity
//!
//! The naive decrement-check-compensate pattern leaves a window where
//! the counter is transiently negative and visible to concurrent
//! readers. Both mutating operations here run as Lua scripts instead,
//! so the check and the write are one indivisible step on the Redis
//! server:
//!
//! - decrement applies only when the result stays non-negative
//! - credit applies only to a live key, never resurrecting an expired
//!   campaign counter without a TTL

use flashstock_core::error::{Result, StockError};
use flashstock_core::providers::{CounterStore, DecrementOutcome};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Conditional decrement. Result codes follow the campaign stock
/// convention: `{1, remaining}` applied, `{-1, available}` insufficient,
/// `{-3, 0}` key missing.
const TRY_DECREMENT_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[1])
if not current then
    return {-3, 0}
end
current = tonumber(current)
local amount = tonumber(ARGV[1])
if current < amount then
    return {-1, current}
end
return {1, redis.call('DECRBY', KEYS[1], amount)}
";

/// Guarded credit: `{1, value}` applied, `{0, 0}` key missing/expired.
const CREDIT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return {0, 0}
end
return {1, redis.call('INCRBY', KEYS[1], ARGV[1])}
";

/// `Redis`-backed [`CounterStore`].
///
/// # Example
///
/// ```no_run
/// use flashstock_redis::RedisCounterStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedisCounterStore::new("redis://127.0.0.1:6379").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisCounterStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisCounterStore {
    /// Create a counter store connected to the given `Redis` URL.
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Ok(Self {
            conn_manager: crate::connect(redis_url).await?,
        })
    }

    /// Create a counter store over an existing connection manager.
    #[must_use]
    pub const fn with_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    /// EXPIRE/EX reject zero; clamp sub-second TTLs up to one second.
    fn ttl_seconds(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

impl CounterStore for RedisCounterStore {
    async fn initialize(&self, key: &str, quantity: i64, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .set_ex(key, quantity, Self::ttl_seconds(ttl))
            .await
            .map_err(|e| StockError::unavailable(format!("failed to initialize counter: {e}")))?;

        tracing::debug!(key = %key, quantity, "counter initialized");
        Ok(())
    }

    async fn initialize_if_absent(&self, key: &str, quantity: i64, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        // SET NX EX: nil reply means a live counter already existed.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(quantity)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_seconds(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| StockError::unavailable(format!("failed to seed counter: {e}")))?;

        Ok(reply.is_some())
    }

    async fn try_decrement(&self, key: &str, amount: i64) -> Result<DecrementOutcome> {
        let mut conn = self.conn_manager.clone();

        let reply: Vec<i64> = redis::Script::new(TRY_DECREMENT_SCRIPT)
            .key(key)
            .arg(amount)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StockError::unavailable(format!("failed to decrement counter: {e}")))?;

        match reply.as_slice() {
            [1, remaining] => Ok(DecrementOutcome::Applied {
                remaining: *remaining,
            }),
            [-1, available] => Ok(DecrementOutcome::Insufficient {
                available: *available,
            }),
            [-3, _] => Ok(DecrementOutcome::Missing),
            other => Err(StockError::backend(format!(
                "unexpected decrement script reply: {other:?}"
            ))),
        }
    }

    async fn increment(&self, key: &str, amount: i64) -> Result<Option<i64>> {
        let mut conn = self.conn_manager.clone();

        let reply: Vec<i64> = redis::Script::new(CREDIT_SCRIPT)
            .key(key)
            .arg(amount)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StockError::unavailable(format!("failed to credit counter: {e}")))?;

        match reply.as_slice() {
            [1, value] => Ok(Some(*value)),
            [0, _] => Ok(None),
            other => Err(StockError::backend(format!(
                "unexpected credit script reply: {other:?}"
            ))),
        }
    }

    async fn read(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.conn_manager.clone();

        conn.get(key)
            .await
            .map_err(|e| StockError::unavailable(format!("failed to read counter: {e}")))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .del(key)
            .await
            .map_err(|e| StockError::unavailable(format!("failed to remove counter: {e}")))?;

        tracing::debug!(key = %key, "counter removed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    async fn store() -> RedisCounterStore {
        RedisCounterStore::new("redis://127.0.0.1:6379")
            .await
            .unwrap()
    }

    fn test_key(label: &str) -> String {
        format!("test:stock:{label}:{}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn decrement_applies_only_while_stock_lasts() {
        let store = store().await;
        let key = test_key("deduct");
        store
            .initialize(&key, 5, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            store.try_decrement(&key, 3).await.unwrap(),
            DecrementOutcome::Applied { remaining: 2 }
        );
        assert_eq!(
            store.try_decrement(&key, 3).await.unwrap(),
            DecrementOutcome::Insufficient { available: 2 }
        );
        assert_eq!(store.read(&key).await.unwrap(), Some(2));

        store.remove(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn missing_key_is_reported_not_created() {
        let store = store().await;
        let key = test_key("missing");

        assert_eq!(
            store.try_decrement(&key, 1).await.unwrap(),
            DecrementOutcome::Missing
        );
        assert_eq!(store.increment(&key, 1).await.unwrap(), None);
        assert_eq!(store.read(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn seed_if_absent_yields_to_a_live_counter() {
        let store = store().await;
        let key = test_key("seed");

        assert!(store
            .initialize_if_absent(&key, 10, Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!store
            .initialize_if_absent(&key, 99, Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(store.read(&key).await.unwrap(), Some(10));

        store.remove(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn credit_returns_the_new_value() {
        let store = store().await;
        let key = test_key("credit");
        store
            .initialize(&key, 5, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.increment(&key, 4).await.unwrap(), Some(9));

        store.remove(&key).await.unwrap();
    }
}
