//! Authoritative stock ledger trait.

use crate::error::Result;
use crate::state::SkuId;
use std::future::Future;

/// Read-only view of the authoritative stock ledger.
///
/// The ledger is the persistent source of truth for remaining stock,
/// consulted only to seed or reseed a campaign counter (the cold path).
/// This core never writes to it; ledger mutation belongs to the order
/// and inventory workflows outside this crate.
pub trait StockLedger: Send + Sync {
    /// Point read of the true remaining stock for a SKU.
    ///
    /// # Returns
    ///
    /// `None` when the SKU has no authoritative record — terminal for
    /// that SKU, not a retryable condition.
    ///
    /// # Errors
    ///
    /// Returns error if the ledger is unreachable.
    fn remaining_stock(&self, sku: SkuId) -> impl Future<Output = Result<Option<i64>>> + Send;
}
