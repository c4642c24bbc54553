//! Error types for stock reservation operations.

use thiserror::Error;

/// Result type alias for stock operations.
pub type Result<T> = std::result::Result<T, StockError>;

/// Error taxonomy for the stock reservation core.
///
/// Sold-out and unknown-SKU conditions are **not** errors: they are
/// high-frequency, expected outcomes and are reported through
/// [`ReserveOutcome`](crate::state::ReserveOutcome). This enum covers the
/// conditions where the core cannot answer at all and must fail closed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Counter store or ledger unreachable or timed out.
    ///
    /// Reserve paths must treat this as a decline — never assume a
    /// decrement succeeded under a partition. Retry policy belongs to the
    /// caller, not this core.
    #[error("backend unavailable: {context}")]
    Unavailable {
        /// What was being attempted when the backend went away.
        context: String,
    },

    /// Backend answered, but with something the core cannot interpret
    /// (malformed script result, undecodable row, poisoned lock).
    #[error("backend error: {context}")]
    Backend {
        /// Description of the protocol-level failure.
        context: String,
    },

    /// Reservation quantity precondition violated (must be positive).
    #[error("invalid reservation quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity.
        quantity: i64,
    },
}

impl StockError {
    /// Build an [`StockError::Unavailable`] with formatted context.
    pub fn unavailable(context: impl Into<String>) -> Self {
        Self::Unavailable {
            context: context.into(),
        }
    }

    /// Build a [`StockError::Backend`] with formatted context.
    pub fn backend(context: impl Into<String>) -> Self {
        Self::Backend {
            context: context.into(),
        }
    }
}
