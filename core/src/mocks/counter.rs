//! In-memory counter store for testing.

use crate::error::{Result, StockError};
use crate::providers::{CounterStore, DecrementOutcome};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    value: i64,
    expires_at: Instant,
}

impl CounterEntry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory counter store.
///
/// All mutation happens under one mutex, giving the same atomicity the
/// coordinator expects from a real backend. Supports fault injection:
/// an offline mode (every call fails `Unavailable`) and an artificial
/// latency for exercising the operation timeout.
#[derive(Debug, Clone)]
pub struct MemoryCounterStore {
    entries: Arc<Mutex<HashMap<String, CounterEntry>>>,
    offline: Arc<AtomicBool>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl MemoryCounterStore {
    /// Create an empty counter store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            offline: Arc::new(AtomicBool::new(false)),
            latency: Arc::new(Mutex::new(None)),
        }
    }

    /// Toggle offline mode: while set, every call fails `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Inject a fixed delay before every call completes.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Direct peek at a live counter value (for assertions).
    ///
    /// # Errors
    ///
    /// Returns error if the internal lock is poisoned.
    pub fn value(&self, key: &str) -> Result<Option<i64>> {
        let entries = lock(&self.entries)?;
        let now = Instant::now();
        Ok(entries.get(key).filter(|e| e.live(now)).map(|e| e.value))
    }

    async fn checkpoint(&self) -> Result<()> {
        let latency = *lock(&self.latency)?;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StockError::unavailable("memory counter store offline"));
        }
        Ok(())
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StockError::backend("mutex lock failed"))
}

impl CounterStore for MemoryCounterStore {
    fn initialize(
        &self,
        key: &str,
        quantity: i64,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();
        let key = key.to_string();

        async move {
            this.checkpoint().await?;
            let mut entries = lock(&this.entries)?;
            entries.insert(
                key,
                CounterEntry {
                    value: quantity,
                    expires_at: Instant::now() + ttl,
                },
            );
            Ok(())
        }
    }

    fn initialize_if_absent(
        &self,
        key: &str,
        quantity: i64,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send {
        let this = self.clone();
        let key = key.to_string();

        async move {
            this.checkpoint().await?;
            let mut entries = lock(&this.entries)?;
            let now = Instant::now();
            if entries.get(&key).is_some_and(|e| e.live(now)) {
                return Ok(false);
            }
            entries.insert(
                key,
                CounterEntry {
                    value: quantity,
                    expires_at: now + ttl,
                },
            );
            Ok(true)
        }
    }

    fn try_decrement(
        &self,
        key: &str,
        amount: i64,
    ) -> impl Future<Output = Result<DecrementOutcome>> + Send {
        let this = self.clone();
        let key = key.to_string();

        async move {
            this.checkpoint().await?;
            let mut entries = lock(&this.entries)?;
            let now = Instant::now();
            let Some(entry) = entries.get_mut(&key).filter(|e| e.live(now)) else {
                return Ok(DecrementOutcome::Missing);
            };
            if entry.value < amount {
                return Ok(DecrementOutcome::Insufficient {
                    available: entry.value,
                });
            }
            entry.value -= amount;
            Ok(DecrementOutcome::Applied {
                remaining: entry.value,
            })
        }
    }

    fn increment(
        &self,
        key: &str,
        amount: i64,
    ) -> impl Future<Output = Result<Option<i64>>> + Send {
        let this = self.clone();
        let key = key.to_string();

        async move {
            this.checkpoint().await?;
            let mut entries = lock(&this.entries)?;
            let now = Instant::now();
            let Some(entry) = entries.get_mut(&key).filter(|e| e.live(now)) else {
                return Ok(None);
            };
            entry.value += amount;
            Ok(Some(entry.value))
        }
    }

    fn read(&self, key: &str) -> impl Future<Output = Result<Option<i64>>> + Send {
        let this = self.clone();
        let key = key.to_string();

        async move {
            this.checkpoint().await?;
            let entries = lock(&this.entries)?;
            let now = Instant::now();
            Ok(entries.get(&key).filter(|e| e.live(now)).map(|e| e.value))
        }
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();
        let key = key.to_string();

        async move {
            this.checkpoint().await?;
            let mut entries = lock(&this.entries)?;
            entries.remove(&key);
            Ok(())
        }
    }
}
