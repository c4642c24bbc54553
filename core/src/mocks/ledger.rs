//! In-memory authoritative stock ledger for testing.

use crate::error::{Result, StockError};
use crate::providers::StockLedger;
use crate::state::SkuId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory stock ledger.
///
/// Counts reads so tests can assert the cold path is single-flight, and
/// supports an offline mode for fail-closed tests.
#[derive(Debug, Clone)]
pub struct MemoryStockLedger {
    records: Arc<Mutex<HashMap<SkuId, i64>>>,
    reads: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl MemoryStockLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            reads: Arc::new(AtomicUsize::new(0)),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the authoritative stock for a SKU.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn set_stock(&self, sku: SkuId, stock: i64) {
        self.records.lock().unwrap().insert(sku, stock);
    }

    /// How many point reads the ledger has served.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Toggle offline mode: while set, every read fails `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl Default for MemoryStockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl StockLedger for MemoryStockLedger {
    fn remaining_stock(&self, sku: SkuId) -> impl Future<Output = Result<Option<i64>>> + Send {
        let this = self.clone();

        async move {
            if this.offline.load(Ordering::SeqCst) {
                return Err(StockError::unavailable("memory ledger offline"));
            }
            this.reads.fetch_add(1, Ordering::SeqCst);
            let records = this
                .records
                .lock()
                .map_err(|_| StockError::backend("mutex lock failed"))?;
            Ok(records.get(&sku).copied())
        }
    }
}
