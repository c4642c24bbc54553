//! Counter store trait.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

/// Result of an atomic conditional decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// The decrement applied; the counter now holds `remaining`.
    Applied {
        /// Counter value after the decrement. Never negative.
        remaining: i64,
    },
    /// The counter holds less than the requested amount; nothing changed.
    Insufficient {
        /// Counter value at the moment the decrement was refused.
        available: i64,
    },
    /// The key is absent or its TTL expired.
    Missing,
}

/// Shared atomic counter service with per-key expiry.
///
/// This trait abstracts over the hot-path counter backend (Redis in
/// production). Correctness of the whole reservation path rests on this
/// contract:
///
/// - [`try_decrement`](Self::try_decrement) and
///   [`increment`](Self::increment) are atomic with respect to **all**
///   concurrent callers on the same key, across every serving process.
///   No lost updates, regardless of caller concurrency degree.
/// - `try_decrement` is conditional: it applies only when the result
///   stays non-negative, so no reader ever observes a negative or
///   transiently incorrect value.
pub trait CounterStore: Send + Sync {
    /// Create or overwrite the counter unconditionally.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable.
    fn initialize(
        &self,
        key: &str,
        quantity: i64,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Seed the counter only when the key is absent (SET NX semantics).
    ///
    /// # Returns
    ///
    /// `true` when this call created the counter, `false` when a live
    /// counter already existed and was left untouched.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable.
    fn initialize_if_absent(
        &self,
        key: &str,
        quantity: i64,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Atomically decrement by `amount`, but only if the result stays
    /// non-negative.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or the script result
    /// cannot be interpreted.
    fn try_decrement(
        &self,
        key: &str,
        amount: i64,
    ) -> impl Future<Output = Result<DecrementOutcome>> + Send;

    /// Atomically credit `amount` back to a live counter.
    ///
    /// # Returns
    ///
    /// The counter value after the credit, or `None` when the key is
    /// absent or expired. A credit must never resurrect a dead campaign
    /// counter (it would live without a TTL).
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable.
    fn increment(
        &self,
        key: &str,
        amount: i64,
    ) -> impl Future<Output = Result<Option<i64>>> + Send;

    /// Point-in-time snapshot of the counter value.
    ///
    /// No atomicity guarantee beyond what the backend naturally provides.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<i64>>> + Send;

    /// Delete the counter (campaign teardown).
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}
