//! Redis-backed reservation store.
//!
//! Each reservation is one Redis hash (`sku`, `quantity`, `status`,
//! `granted_at`), TTL-bounded so abandoned records clean themselves up.
//! The status transition runs as a Lua script: the read of the current
//! status and the write of the new one are a single server-side step,
//! so two concurrent `release` calls for one id can never both win.

use chrono::{DateTime, Utc};
use flashstock_core::error::{Result, StockError};
use flashstock_core::providers::{ReservationStore, TransitionOutcome};
use flashstock_core::state::{Reservation, ReservationId, ReservationStatus, SkuId};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

/// Insert-if-absent: `1` created, `0` id collision.
const INSERT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1],
    'sku', ARGV[1],
    'quantity', ARGV[2],
    'status', ARGV[3],
    'granted_at', ARGV[4])
redis.call('EXPIRE', KEYS[1], ARGV[5])
return 1
";

/// Single-winner transition away from the required current status.
/// Replies: `{'ok', sku, quantity, granted_at}`, `{'conflict', status}`,
/// `{'missing'}`.
const TRANSITION_SCRIPT: &str = r"
local status = redis.call('HGET', KEYS[1], 'status')
if not status then
    return {'missing'}
end
if status ~= ARGV[1] then
    return {'conflict', status}
end
redis.call('HSET', KEYS[1], 'status', ARGV[2])
return {'ok',
    redis.call('HGET', KEYS[1], 'sku'),
    redis.call('HGET', KEYS[1], 'quantity'),
    redis.call('HGET', KEYS[1], 'granted_at')}
";

const DEFAULT_KEY_PREFIX: &str = "seckill:rsv:";

/// `Redis`-backed [`ReservationStore`].
#[derive(Clone)]
pub struct RedisReservationStore {
    conn_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisReservationStore {
    /// Create a reservation store connected to the given `Redis` URL.
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        Ok(Self::with_manager(crate::connect(redis_url).await?))
    }

    /// Create a reservation store over an existing connection manager.
    #[must_use]
    pub fn with_manager(conn_manager: ConnectionManager) -> Self {
        Self {
            conn_manager,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Override the reservation key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn reservation_key(&self, id: ReservationId) -> String {
        format!("{}{id}", self.key_prefix)
    }

    fn decode(
        id: ReservationId,
        status: ReservationStatus,
        sku: &str,
        quantity: &str,
        granted_at: &str,
    ) -> Result<Reservation> {
        let sku = sku
            .parse::<u64>()
            .map_err(|e| StockError::backend(format!("bad sku field for {id}: {e}")))?;
        let quantity = quantity
            .parse::<i64>()
            .map_err(|e| StockError::backend(format!("bad quantity field for {id}: {e}")))?;
        let granted_at = DateTime::parse_from_rfc3339(granted_at)
            .map_err(|e| StockError::backend(format!("bad granted_at field for {id}: {e}")))?
            .with_timezone(&Utc);

        Ok(Reservation {
            id,
            sku: SkuId::new(sku),
            quantity,
            status,
            granted_at,
        })
    }
}

impl ReservationStore for RedisReservationStore {
    async fn insert(&self, reservation: &Reservation, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = self.reservation_key(reservation.id);

        let created: i64 = redis::Script::new(INSERT_SCRIPT)
            .key(&key)
            .arg(reservation.sku.0)
            .arg(reservation.quantity)
            .arg(reservation.status.as_str())
            .arg(reservation.granted_at.to_rfc3339())
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StockError::unavailable(format!("failed to insert reservation: {e}")))?;

        if created == 0 {
            return Err(StockError::backend(format!(
                "reservation {} already exists",
                reservation.id
            )));
        }

        tracing::debug!(
            reservation = %reservation.id,
            sku = %reservation.sku,
            quantity = reservation.quantity,
            "reservation recorded"
        );
        Ok(())
    }

    async fn transition(
        &self,
        id: ReservationId,
        to: ReservationStatus,
    ) -> Result<TransitionOutcome> {
        let mut conn = self.conn_manager.clone();
        let key = self.reservation_key(id);

        let reply: Vec<String> = redis::Script::new(TRANSITION_SCRIPT)
            .key(&key)
            .arg(ReservationStatus::Granted.as_str())
            .arg(to.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                StockError::unavailable(format!("failed to transition reservation: {e}"))
            })?;

        match reply.as_slice() {
            [ok, sku, quantity, granted_at] if ok == "ok" => Ok(TransitionOutcome::Applied(
                Self::decode(id, to, sku, quantity, granted_at)?,
            )),
            [conflict, status] if conflict == "conflict" => {
                let current = ReservationStatus::parse(status).ok_or_else(|| {
                    StockError::backend(format!("bad status field for {id}: {status}"))
                })?;
                Ok(TransitionOutcome::Conflict { current })
            }
            [missing] if missing == "missing" => Ok(TransitionOutcome::Missing),
            other => Err(StockError::backend(format!(
                "unexpected transition script reply: {other:?}"
            ))),
        }
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let mut conn = self.conn_manager.clone();
        let key = self.reservation_key(id);

        let fields: HashMap<String, String> = conn
            .hgetall(&key)
            .await
            .map_err(|e| StockError::unavailable(format!("failed to read reservation: {e}")))?;

        if fields.is_empty() {
            return Ok(None);
        }

        let field = |name: &str| {
            fields
                .get(name)
                .ok_or_else(|| StockError::backend(format!("missing {name} field for {id}")))
        };
        let status = ReservationStatus::parse(field("status")?).ok_or_else(|| {
            StockError::backend(format!("bad status field for {id}"))
        })?;

        Self::decode(id, status, field("sku")?, field("quantity")?, field("granted_at")?).map(Some)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    async fn store() -> RedisReservationStore {
        RedisReservationStore::new("redis://127.0.0.1:6379")
            .await
            .unwrap()
            .with_key_prefix(format!("test:rsv:{}:", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn insert_then_get_roundtrips() {
        let store = store().await;
        let reservation = Reservation::granted(SkuId::new(7), 3);

        store
            .insert(&reservation, Duration::from_secs(60))
            .await
            .unwrap();

        let fetched = store.get(reservation.id).await.unwrap().unwrap();
        assert_eq!(fetched.sku, reservation.sku);
        assert_eq!(fetched.quantity, reservation.quantity);
        assert_eq!(fetched.status, ReservationStatus::Granted);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn transition_has_a_single_winner() {
        let store = store().await;
        let reservation = Reservation::granted(SkuId::new(8), 2);
        store
            .insert(&reservation, Duration::from_secs(60))
            .await
            .unwrap();

        let first = store
            .transition(reservation.id, ReservationStatus::Released)
            .await
            .unwrap();
        assert!(matches!(first, TransitionOutcome::Applied(_)));

        let second = store
            .transition(reservation.id, ReservationStatus::Released)
            .await
            .unwrap();
        assert_eq!(
            second,
            TransitionOutcome::Conflict {
                current: ReservationStatus::Released
            }
        );
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn transition_on_unknown_id_is_missing() {
        let store = store().await;
        let outcome = store
            .transition(ReservationId::new(), ReservationStatus::Released)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Missing);
    }
}
