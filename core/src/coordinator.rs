//! The reservation coordinator.
//!
//! Admits or declines reservation attempts against a campaign counter,
//! releases abandoned grants, and resynchronizes the counter from the
//! authoritative ledger on cache miss.
//!
//! # Concurrency model
//!
//! The hot path holds **no in-process locks**: correctness is delegated
//! entirely to the counter store's atomic conditional decrement, so
//! throughput for a hot SKU scales across all serving processes instead
//! of serializing on one. The only in-process synchronization is the
//! per-SKU single-flight gate on the cold path, which collapses a
//! thundering herd of cache-miss observers into one ledger read.
//!
//! Every remote call is bounded by [`StockConfig::op_timeout`]; an
//! elapsed timer fails closed as [`StockError::Unavailable`] — the
//! coordinator never assumes a decrement succeeded under a partition.

use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::providers::{
    CounterStore, DecrementOutcome, ReservationStore, StockLedger, TransitionOutcome,
};
use crate::state::{
    CommitOutcome, ReleaseOutcome, Reservation, ReservationId, ReservationStatus, ReserveOutcome,
    ResyncOutcome, SkuId,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Coordinates flash-sale stock reservations over a counter store, an
/// authoritative ledger, and a reservation store.
///
/// # Example
///
/// ```ignore
/// use flashstock_core::{StockConfig, StockCoordinator};
///
/// let coordinator = StockCoordinator::new(counter, ledger, reservations, StockConfig::new());
///
/// coordinator.open_campaign(sku, 500).await?;
/// match coordinator.reserve(sku, 2).await? {
///     ReserveOutcome::Granted { reservation, remaining } => { /* hold won */ }
///     ReserveOutcome::SoldOut { .. } => { /* normal outcome, not a fault */ }
///     ReserveOutcome::NotFound => { /* unknown SKU */ }
/// }
/// ```
pub struct StockCoordinator<C, L, R> {
    counter: C,
    ledger: L,
    reservations: R,
    config: StockConfig,
    /// Per-SKU gates serializing cold-path loads (single-flight).
    cold_gates: Mutex<HashMap<SkuId, Arc<Mutex<()>>>>,
}

impl<C, L, R> StockCoordinator<C, L, R>
where
    C: CounterStore,
    L: StockLedger,
    R: ReservationStore,
{
    /// Create a coordinator over the given providers.
    pub fn new(counter: C, ledger: L, reservations: R, config: StockConfig) -> Self {
        Self {
            counter,
            ledger,
            reservations,
            config,
            cold_gates: Mutex::new(HashMap::new()),
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &StockConfig {
        &self.config
    }

    /// Attempt to reserve `quantity` units of `sku`.
    ///
    /// On a cache miss the counter is reseeded from the ledger (single
    /// flight per SKU) and the decrement retried exactly once. A
    /// successful debit creates a `Granted` reservation record whose id
    /// the caller must keep to later [`release`](Self::release) or
    /// [`commit`](Self::commit) the hold.
    ///
    /// # Errors
    ///
    /// - [`StockError::InvalidQuantity`] if `quantity <= 0`
    /// - [`StockError::Unavailable`] if a backend is unreachable or a
    ///   round trip exceeds the operation timeout (fail closed)
    pub async fn reserve(&self, sku: SkuId, quantity: i64) -> Result<ReserveOutcome> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity { quantity });
        }
        let key = self.config.stock_key(sku);

        let mut outcome = self
            .bounded("counter decrement", self.counter.try_decrement(&key, quantity))
            .await?;

        if outcome == DecrementOutcome::Missing {
            if !self.cold_load(sku, &key).await? {
                tracing::debug!(sku = %sku, "reserve on unknown SKU");
                return Ok(ReserveOutcome::NotFound);
            }
            outcome = self
                .bounded("counter decrement", self.counter.try_decrement(&key, quantity))
                .await?;
        }

        match outcome {
            DecrementOutcome::Applied { remaining } => {
                let reservation = Reservation::granted(sku, quantity);
                if let Err(error) = self
                    .bounded(
                        "reservation insert",
                        self.reservations
                            .insert(&reservation, self.config.reservation_ttl),
                    )
                    .await
                {
                    // The debit is live but unrecorded; roll it back
                    // before failing closed.
                    if self
                        .bounded("debit rollback", self.counter.increment(&key, quantity))
                        .await
                        .is_err()
                    {
                        tracing::error!(
                            sku = %sku,
                            quantity,
                            "debit rollback failed after reservation insert failure; counter undercounts until resync"
                        );
                    }
                    return Err(error);
                }
                tracing::debug!(
                    sku = %sku,
                    quantity,
                    remaining,
                    reservation = %reservation.id,
                    "reservation granted"
                );
                Ok(ReserveOutcome::Granted {
                    reservation: reservation.id,
                    remaining,
                })
            }
            DecrementOutcome::Insufficient { available } => {
                tracing::debug!(sku = %sku, quantity, available, "reservation declined, sold out");
                Ok(ReserveOutcome::SoldOut { available })
            }
            // Seeded and immediately expired, or torn down concurrently.
            DecrementOutcome::Missing => Ok(ReserveOutcome::NotFound),
        }
    }

    /// Release a previously granted reservation, crediting its quantity
    /// back to the campaign counter.
    ///
    /// Idempotent per reservation: only the caller that wins the
    /// `Granted → Released` transition credits stock; later calls see
    /// [`ReleaseOutcome::AlreadyClosed`]. If the campaign counter has
    /// already expired the credit is dropped rather than resurrecting a
    /// TTL-less counter.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Unavailable`] if a backend is unreachable
    /// or times out. If the transition applied but the credit then
    /// failed, the error is reported and the missing credit is logged;
    /// an explicit [`resync`](Self::resync) restores the counter.
    pub async fn release(&self, id: ReservationId) -> Result<ReleaseOutcome> {
        let outcome = self
            .bounded(
                "reservation transition",
                self.reservations.transition(id, ReservationStatus::Released),
            )
            .await?;

        match outcome {
            TransitionOutcome::Applied(reservation) => {
                let key = self.config.stock_key(reservation.sku);
                let remaining = self
                    .bounded(
                        "release credit",
                        self.counter.increment(&key, reservation.quantity),
                    )
                    .await
                    .inspect_err(|error| {
                        tracing::error!(
                            reservation = %id,
                            sku = %reservation.sku,
                            quantity = reservation.quantity,
                            %error,
                            "release transition applied but credit failed; counter undercounts until resync"
                        );
                    })?;
                match remaining {
                    Some(remaining) => {
                        tracing::debug!(
                            reservation = %id,
                            sku = %reservation.sku,
                            quantity = reservation.quantity,
                            remaining,
                            "reservation released"
                        );
                    }
                    None => {
                        tracing::warn!(
                            reservation = %id,
                            sku = %reservation.sku,
                            quantity = reservation.quantity,
                            "campaign counter expired, release credit dropped"
                        );
                    }
                }
                Ok(ReleaseOutcome::Released { remaining })
            }
            TransitionOutcome::Conflict { current } => {
                tracing::debug!(reservation = %id, status = %current, "release on closed reservation");
                Ok(ReleaseOutcome::AlreadyClosed { status: current })
            }
            TransitionOutcome::Missing => Ok(ReleaseOutcome::NotFound),
        }
    }

    /// Mark a granted reservation as consumed by order finalization.
    ///
    /// No stock moves: the debit stays in the counter, and writing the
    /// sale back to the authoritative ledger belongs to the order
    /// workflow, not this core.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Unavailable`] if the reservation store is
    /// unreachable or times out.
    pub async fn commit(&self, id: ReservationId) -> Result<CommitOutcome> {
        let outcome = self
            .bounded(
                "reservation transition",
                self.reservations.transition(id, ReservationStatus::Committed),
            )
            .await?;

        match outcome {
            TransitionOutcome::Applied(reservation) => {
                tracing::debug!(
                    reservation = %id,
                    sku = %reservation.sku,
                    quantity = reservation.quantity,
                    "reservation committed"
                );
                Ok(CommitOutcome::Committed)
            }
            TransitionOutcome::Conflict { current } => {
                Ok(CommitOutcome::AlreadyClosed { status: current })
            }
            TransitionOutcome::Missing => Ok(CommitOutcome::NotFound),
        }
    }

    /// Explicitly resynchronize the counter from the authoritative
    /// ledger, overwriting whatever the counter holds.
    ///
    /// Last-writer-wins: a decrement racing between the ledger read and
    /// the overwrite is lost, so this is an operator/maintenance action
    /// for quiesced traffic. The cold path inside [`reserve`](Self::reserve)
    /// instead seeds with set-if-absent under a single-flight gate and
    /// cannot clobber a racing initializer.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Unavailable`] if the ledger or counter
    /// store is unreachable or times out.
    pub async fn resync(&self, sku: SkuId) -> Result<ResyncOutcome> {
        let Some(stock) = self
            .bounded("ledger read", self.ledger.remaining_stock(sku))
            .await?
        else {
            return Ok(ResyncOutcome::NotFound);
        };

        let key = self.config.stock_key(sku);
        self.bounded(
            "counter overwrite",
            self.counter.initialize(&key, stock, self.config.campaign_ttl),
        )
        .await?;

        tracing::info!(sku = %sku, stock, "counter resynchronized from ledger");
        Ok(ResyncOutcome::Seeded { stock })
    }

    /// Point-in-time snapshot of the live counter for a SKU.
    ///
    /// No side effects; `None` when no counter is live. Intended for
    /// read-only reporting consumers.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Unavailable`] if the counter store is
    /// unreachable or times out.
    pub async fn stock(&self, sku: SkuId) -> Result<Option<i64>> {
        let key = self.config.stock_key(sku);
        self.bounded("counter read", self.counter.read(&key)).await
    }

    /// Open a campaign: seed the counter with the campaign's stock and
    /// TTL, overwriting any stale counter for the SKU.
    ///
    /// # Errors
    ///
    /// - [`StockError::InvalidQuantity`] if `stock < 0`
    /// - [`StockError::Unavailable`] if the counter store is unreachable
    ///   or times out
    pub async fn open_campaign(&self, sku: SkuId, stock: i64) -> Result<()> {
        if stock < 0 {
            return Err(StockError::InvalidQuantity { quantity: stock });
        }
        let key = self.config.stock_key(sku);
        self.bounded(
            "campaign seed",
            self.counter.initialize(&key, stock, self.config.campaign_ttl),
        )
        .await?;
        tracing::info!(sku = %sku, stock, "campaign opened");
        Ok(())
    }

    /// Seed a batch of campaigns at startup, continuing past individual
    /// failures.
    ///
    /// Returns how many campaigns were seeded; failures are logged per
    /// SKU.
    pub async fn open_campaigns(&self, seeds: &[(SkuId, i64)]) -> usize {
        let mut opened = 0;
        for &(sku, stock) in seeds {
            match self.open_campaign(sku, stock).await {
                Ok(()) => opened += 1,
                Err(error) => {
                    tracing::error!(sku = %sku, stock, %error, "campaign seed failed");
                }
            }
        }
        tracing::info!(opened, total = seeds.len(), "campaign batch seeded");
        opened
    }

    /// Close a campaign: delete its counter.
    ///
    /// Reservations released after close drop their credit (the counter
    /// is gone).
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Unavailable`] if the counter store is
    /// unreachable or times out.
    pub async fn close_campaign(&self, sku: SkuId) -> Result<()> {
        let key = self.config.stock_key(sku);
        self.bounded("campaign teardown", self.counter.remove(&key))
            .await?;
        tracing::info!(sku = %sku, "campaign closed");
        Ok(())
    }

    /// Cold-path load: reseed the counter from the ledger, single flight
    /// per SKU.
    ///
    /// Returns `true` when a counter is live afterwards, `false` when
    /// the SKU has no authoritative record.
    async fn cold_load(&self, sku: SkuId, key: &str) -> Result<bool> {
        let gate = {
            let mut gates = self.cold_gates.lock().await;
            Arc::clone(gates.entry(sku).or_default())
        };

        let result = {
            let _held = gate.lock().await;
            self.cold_load_locked(sku, key).await
        };

        // Drop the gate entry once no other caller holds a clone. A
        // waiter that grabbed the Arc just before removal keeps a working
        // gate; the worst case is two seed attempts, both set-if-absent.
        let mut gates = self.cold_gates.lock().await;
        if Arc::strong_count(&gate) == 2 {
            gates.remove(&sku);
        }

        result
    }

    async fn cold_load_locked(&self, sku: SkuId, key: &str) -> Result<bool> {
        // A racing loader may have seeded while we waited on the gate.
        if self
            .bounded("counter read", self.counter.read(key))
            .await?
            .is_some()
        {
            return Ok(true);
        }

        let Some(stock) = self
            .bounded("ledger read", self.ledger.remaining_stock(sku))
            .await?
        else {
            tracing::warn!(sku = %sku, "cold load found no authoritative stock record");
            return Ok(false);
        };

        let seeded = self
            .bounded(
                "counter seed",
                self.counter
                    .initialize_if_absent(key, stock, self.config.campaign_ttl),
            )
            .await?;
        tracing::debug!(sku = %sku, stock, seeded, "counter reseeded from ledger");
        Ok(true)
    }

    /// Bound a remote round trip by the operation timeout, failing
    /// closed on expiry.
    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    operation = what,
                    timeout = ?self.config.op_timeout,
                    "operation timed out (failing closed)"
                );
                Err(StockError::unavailable(format!(
                    "{what} timed out after {:?}",
                    self.config.op_timeout
                )))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mocks::{MemoryCounterStore, MemoryReservationStore, MemoryStockLedger};
    use std::time::Duration;

    type TestCoordinator =
        StockCoordinator<MemoryCounterStore, MemoryStockLedger, MemoryReservationStore>;

    fn coordinator() -> (
        TestCoordinator,
        MemoryCounterStore,
        MemoryStockLedger,
        MemoryReservationStore,
    ) {
        let counter = MemoryCounterStore::new();
        let ledger = MemoryStockLedger::new();
        let reservations = MemoryReservationStore::new();
        let coordinator = StockCoordinator::new(
            counter.clone(),
            ledger.clone(),
            reservations.clone(),
            StockConfig::new(),
        );
        (coordinator, counter, ledger, reservations)
    }

    #[tokio::test]
    async fn grant_then_sold_out_leaves_counter_untouched() {
        // Scenario A: stock 10, reserve 3 grants with 7 remaining,
        // reserve 8 declines and the counter stays at 7.
        let (coordinator, _, _, _) = coordinator();
        let sku = SkuId::new(1);
        coordinator.open_campaign(sku, 10).await.unwrap();

        let outcome = coordinator.reserve(sku, 3).await.unwrap();
        assert!(matches!(outcome, ReserveOutcome::Granted { remaining: 7, .. }));

        let outcome = coordinator.reserve(sku, 8).await.unwrap();
        assert_eq!(outcome, ReserveOutcome::SoldOut { available: 7 });
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn cache_miss_reseeds_from_ledger_and_grants() {
        // Scenario B: no live counter, ledger holds 5; reserve 2 seeds
        // then grants with 3 remaining.
        let (coordinator, _, ledger, _) = coordinator();
        let sku = SkuId::new(2);
        ledger.set_stock(sku, 5);

        let outcome = coordinator.reserve(sku, 2).await.unwrap();
        assert!(matches!(outcome, ReserveOutcome::Granted { remaining: 3, .. }));
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(3));
        assert_eq!(ledger.read_count(), 1);
    }

    #[tokio::test]
    async fn unknown_sku_is_terminal_not_found() {
        let (coordinator, _, _, _) = coordinator();
        let sku = SkuId::new(3);

        assert_eq!(coordinator.reserve(sku, 1).await.unwrap(), ReserveOutcome::NotFound);
        assert_eq!(coordinator.reserve(sku, 1).await.unwrap(), ReserveOutcome::NotFound);
        assert_eq!(coordinator.stock(sku).await.unwrap(), None);
    }

    #[tokio::test]
    async fn release_is_inverse_of_reserve() {
        // Scenario D: reserve 4 then release restores the pre-reserve value.
        let (coordinator, _, _, _) = coordinator();
        let sku = SkuId::new(4);
        coordinator.open_campaign(sku, 10).await.unwrap();

        let ReserveOutcome::Granted { reservation, .. } =
            coordinator.reserve(sku, 4).await.unwrap()
        else {
            panic!("expected grant");
        };
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(6));

        let outcome = coordinator.release(reservation).await.unwrap();
        assert_eq!(outcome, ReleaseOutcome::Released { remaining: Some(10) });
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn double_release_credits_stock_exactly_once() {
        let (coordinator, _, _, _) = coordinator();
        let sku = SkuId::new(5);
        coordinator.open_campaign(sku, 10).await.unwrap();

        let ReserveOutcome::Granted { reservation, .. } =
            coordinator.reserve(sku, 4).await.unwrap()
        else {
            panic!("expected grant");
        };

        coordinator.release(reservation).await.unwrap();
        let second = coordinator.release(reservation).await.unwrap();
        assert_eq!(
            second,
            ReleaseOutcome::AlreadyClosed {
                status: ReservationStatus::Released
            }
        );
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn commit_then_release_does_not_credit_stock() {
        let (coordinator, _, _, _) = coordinator();
        let sku = SkuId::new(6);
        coordinator.open_campaign(sku, 10).await.unwrap();

        let ReserveOutcome::Granted { reservation, .. } =
            coordinator.reserve(sku, 3).await.unwrap()
        else {
            panic!("expected grant");
        };

        assert_eq!(coordinator.commit(reservation).await.unwrap(), CommitOutcome::Committed);
        let outcome = coordinator.release(reservation).await.unwrap();
        assert_eq!(
            outcome,
            ReleaseOutcome::AlreadyClosed {
                status: ReservationStatus::Committed
            }
        );
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn release_of_unknown_reservation_is_not_found() {
        let (coordinator, _, _, _) = coordinator();
        let outcome = coordinator.release(ReservationId::new()).await.unwrap();
        assert_eq!(outcome, ReleaseOutcome::NotFound);
    }

    #[tokio::test]
    async fn resync_restores_exact_ledger_value() {
        let (coordinator, _, ledger, _) = coordinator();
        let sku = SkuId::new(7);
        ledger.set_stock(sku, 42);
        coordinator.open_campaign(sku, 3).await.unwrap();

        let outcome = coordinator.resync(sku).await.unwrap();
        assert_eq!(outcome, ResyncOutcome::Seeded { stock: 42 });
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn resync_without_ledger_record_is_not_found() {
        let (coordinator, _, _, _) = coordinator();
        assert_eq!(
            coordinator.resync(SkuId::new(8)).await.unwrap(),
            ResyncOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn non_positive_quantities_are_rejected() {
        let (coordinator, _, _, _) = coordinator();
        let sku = SkuId::new(9);
        coordinator.open_campaign(sku, 10).await.unwrap();

        assert_eq!(
            coordinator.reserve(sku, 0).await,
            Err(StockError::InvalidQuantity { quantity: 0 })
        );
        assert_eq!(
            coordinator.reserve(sku, -2).await,
            Err(StockError::InvalidQuantity { quantity: -2 })
        );
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn counter_outage_fails_closed() {
        let (coordinator, counter, _, _) = coordinator();
        let sku = SkuId::new(10);
        coordinator.open_campaign(sku, 10).await.unwrap();

        counter.set_offline(true);
        let result = coordinator.reserve(sku, 1).await;
        assert!(matches!(result, Err(StockError::Unavailable { .. })));

        // Service resumes with the counter unchanged.
        counter.set_offline(false);
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_trips_the_operation_timeout() {
        let counter = MemoryCounterStore::new();
        counter.set_latency(Duration::from_secs(5));
        let coordinator = StockCoordinator::new(
            counter.clone(),
            MemoryStockLedger::new(),
            MemoryReservationStore::new(),
            StockConfig::new().with_op_timeout(Duration::from_secs(1)),
        );

        let result = coordinator.reserve(SkuId::new(11), 1).await;
        assert!(matches!(result, Err(StockError::Unavailable { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn release_after_campaign_expiry_drops_the_credit() {
        let counter = MemoryCounterStore::new();
        let coordinator = StockCoordinator::new(
            counter.clone(),
            MemoryStockLedger::new(),
            MemoryReservationStore::new(),
            StockConfig::new().with_campaign_ttl(Duration::from_secs(60)),
        );
        let sku = SkuId::new(12);
        coordinator.open_campaign(sku, 10).await.unwrap();

        let ReserveOutcome::Granted { reservation, .. } =
            coordinator.reserve(sku, 2).await.unwrap()
        else {
            panic!("expected grant");
        };

        tokio::time::advance(Duration::from_secs(120)).await;

        let outcome = coordinator.release(reservation).await.unwrap();
        assert_eq!(outcome, ReleaseOutcome::Released { remaining: None });
        assert_eq!(coordinator.stock(sku).await.unwrap(), None);
    }

    #[tokio::test]
    async fn close_campaign_removes_the_counter() {
        let (coordinator, _, _, _) = coordinator();
        let sku = SkuId::new(13);
        coordinator.open_campaign(sku, 5).await.unwrap();
        coordinator.close_campaign(sku).await.unwrap();
        assert_eq!(coordinator.stock(sku).await.unwrap(), None);
    }

    #[tokio::test]
    async fn campaign_batch_seeding_continues_past_failures() {
        let (coordinator, _, _, _) = coordinator();
        let seeds = [
            (SkuId::new(14), 5),
            (SkuId::new(15), -1), // rejected, logged, skipped
            (SkuId::new(16), 8),
        ];
        let opened = coordinator.open_campaigns(&seeds).await;
        assert_eq!(opened, 2);
        assert_eq!(coordinator.stock(SkuId::new(14)).await.unwrap(), Some(5));
        assert_eq!(coordinator.stock(SkuId::new(15)).await.unwrap(), None);
        assert_eq!(coordinator.stock(SkuId::new(16)).await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn failed_reservation_insert_rolls_the_debit_back() {
        let (coordinator, _, _, reservations) = coordinator();
        let sku = SkuId::new(17);
        coordinator.open_campaign(sku, 10).await.unwrap();

        reservations.fail_next_insert();
        let result = coordinator.reserve(sku, 3).await;
        assert!(result.is_err());
        assert_eq!(coordinator.stock(sku).await.unwrap(), Some(10));
    }
}
