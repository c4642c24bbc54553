//! In-memory provider implementations for testing.
//!
//! Simple, deterministic implementations of the provider traits for use
//! in unit and integration tests. Atomicity is provided by a single
//! mutex per store, which is exactly the contract the coordinator
//! relies on. Counter expiry uses `tokio::time::Instant`, so tests can
//! drive TTLs with `tokio::time::advance`.

pub mod counter;
pub mod ledger;
pub mod reservations;

pub use counter::MemoryCounterStore;
pub use ledger::MemoryStockLedger;
pub use reservations::MemoryReservationStore;
