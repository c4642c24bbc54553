//! Provider traits for the stock reservation core.
//!
//! This module defines traits for the external dependencies the
//! coordinator consumes. Providers are **interfaces**, not
//! implementations: the coordinator depends on these traits, and the
//! application wires in concrete backends.
//!
//! ```text
//! Hot path (every reserve):        Cold path (cache miss only):
//! ┌────────────────────┐           ┌──────────────────────────┐
//! │ StockCoordinator   │           │ StockLedger              │
//! │   try_decrement ───┼──► Redis  │   remaining_stock ───► DB │
//! └────────────────────┘           └──────────────────────────┘
//! ```
//!
//! This enables:
//! - **Testing**: in-memory mocks, deterministic and fast
//! - **Production**: Redis counter store, `PostgreSQL` ledger
//! - **Development**: instrumented wrappers (logging, tracing)

pub mod counter;
pub mod ledger;
pub mod reservations;

pub use counter::{CounterStore, DecrementOutcome};
pub use ledger::StockLedger;
pub use reservations::{ReservationStore, TransitionOutcome};
