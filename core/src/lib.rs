//! # Flashstock Core
//!
//! Core traits and the reservation coordinator for flash-sale stock.
//!
//! Many concurrent buyers compete for a strictly limited, rapidly
//! depleting SKU quantity. This crate keeps them from overselling it
//! while the authoritative relational ledger stays off the per-request
//! hot path:
//!
//! - **Hot path** — every reserve is one atomic conditional decrement
//!   against a shared counter ([`providers::CounterStore`]).
//! - **Cold path** — on cache miss the counter is reseeded from the
//!   authoritative ledger ([`providers::StockLedger`]), single flight
//!   per SKU.
//! - **Grants are entities** — each successful reserve creates an
//!   identified [`state::Reservation`] whose release/commit is a
//!   single-winner state transition, so a double release can never
//!   double-credit stock.
//!
//! ## Example
//!
//! ```ignore
//! use flashstock_core::{StockConfig, StockCoordinator};
//! use flashstock_core::state::{ReserveOutcome, SkuId};
//!
//! let coordinator = StockCoordinator::new(counter, ledger, reservations, StockConfig::new());
//!
//! coordinator.open_campaign(SkuId::new(1001), 500).await?;
//!
//! match coordinator.reserve(SkuId::new(1001), 2).await? {
//!     ReserveOutcome::Granted { reservation, remaining } => { /* hold won */ }
//!     ReserveOutcome::SoldOut { .. } => { /* normal, high-frequency outcome */ }
//!     ReserveOutcome::NotFound => { /* no such SKU anywhere */ }
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod coordinator;
pub mod error;
pub mod providers;
pub mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use config::StockConfig;
pub use coordinator::StockCoordinator;
pub use error::{Result, StockError};
pub use providers::{
    CounterStore, DecrementOutcome, ReservationStore, StockLedger, TransitionOutcome,
};
pub use state::{
    CommitOutcome, ReleaseOutcome, Reservation, ReservationId, ReservationStatus, ReserveOutcome,
    ResyncOutcome, SkuId,
};
