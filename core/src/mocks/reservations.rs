//! In-memory reservation store for testing.

use crate::error::{Result, StockError};
use crate::providers::{ReservationStore, TransitionOutcome};
use crate::state::{Reservation, ReservationId, ReservationStatus};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory reservation store.
///
/// Transitions are single-winner under the store mutex. Supports
/// injecting one insert failure for debit-rollback tests.
#[derive(Debug, Clone)]
pub struct MemoryReservationStore {
    entries: Arc<Mutex<HashMap<ReservationId, Reservation>>>,
    fail_next_insert: Arc<AtomicBool>,
}

impl MemoryReservationStore {
    /// Create an empty reservation store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            fail_next_insert: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make the next `insert` call fail `Unavailable`.
    pub fn fail_next_insert(&self) {
        self.fail_next_insert.store(true, Ordering::SeqCst);
    }

    /// Number of stored reservations (for assertions).
    ///
    /// # Errors
    ///
    /// Returns error if the internal lock is poisoned.
    pub fn reservation_count(&self) -> Result<usize> {
        Ok(lock(&self.entries)?.len())
    }
}

impl Default for MemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StockError::backend("mutex lock failed"))
}

impl ReservationStore for MemoryReservationStore {
    fn insert(
        &self,
        reservation: &Reservation,
        _ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send {
        let this = self.clone();
        let reservation = reservation.clone();

        async move {
            if this.fail_next_insert.swap(false, Ordering::SeqCst) {
                return Err(StockError::unavailable("memory reservation store offline"));
            }
            let mut entries = lock(&this.entries)?;
            if entries.contains_key(&reservation.id) {
                return Err(StockError::backend(format!(
                    "reservation {} already exists",
                    reservation.id
                )));
            }
            entries.insert(reservation.id, reservation);
            Ok(())
        }
    }

    fn transition(
        &self,
        id: ReservationId,
        to: ReservationStatus,
    ) -> impl Future<Output = Result<TransitionOutcome>> + Send {
        let this = self.clone();

        async move {
            let mut entries = lock(&this.entries)?;
            let Some(entry) = entries.get_mut(&id) else {
                return Ok(TransitionOutcome::Missing);
            };
            if entry.status != ReservationStatus::Granted {
                return Ok(TransitionOutcome::Conflict {
                    current: entry.status,
                });
            }
            entry.status = to;
            Ok(TransitionOutcome::Applied(entry.clone()))
        }
    }

    fn get(&self, id: ReservationId) -> impl Future<Output = Result<Option<Reservation>>> + Send {
        let this = self.clone();

        async move {
            let entries = lock(&this.entries)?;
            Ok(entries.get(&id).cloned())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::SkuId;

    #[tokio::test]
    async fn transition_applies_exactly_once() {
        let store = MemoryReservationStore::new();
        let reservation = Reservation::granted(SkuId::new(1), 2);
        store
            .insert(&reservation, Duration::from_secs(60))
            .await
            .unwrap();

        let first = store
            .transition(reservation.id, ReservationStatus::Released)
            .await
            .unwrap();
        assert!(matches!(first, TransitionOutcome::Applied(r) if r.status == ReservationStatus::Released));

        let second = store
            .transition(reservation.id, ReservationStatus::Committed)
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
    async fn duplicate_insert_is_rejected() {
        let store = MemoryReservationStore::new();
        let reservation = Reservation::granted(SkuId::new(1), 2);
        store
            .insert(&reservation, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store
            .insert(&reservation, Duration::from_secs(60))
            .await
            .is_err());
    }
}
