//! Domain types for flash-sale stock reservation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SKU identifier: the unit of inventory being reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkuId(pub u64);

impl SkuId {
    /// Create a SKU identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SkuId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reservation identifier (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub uuid::Uuid);

impl ReservationId {
    /// Generate a fresh reservation identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a reservation.
///
/// A reservation is created `Granted` and moves away from `Granted`
/// exactly once: to `Released` when the surrounding order is abandoned,
/// or to `Committed` when order finalization consumes the grant. Both
/// terminal states are absorbing — a second transition is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Stock is held for this reservation.
    Granted,
    /// The hold was abandoned and the stock credited back.
    Released,
    /// The grant was consumed by order finalization.
    Committed,
}

impl ReservationStatus {
    /// Stable string encoding used by persistent stores.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Released => "released",
            Self::Committed => "committed",
        }
    }

    /// Decode the string form produced by [`Self::as_str`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "granted" => Some(Self::Granted),
            "released" => Some(Self::Released),
            "committed" => Some(Self::Committed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grant of quantity against a SKU's campaign counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation identifier.
    pub id: ReservationId,
    /// The SKU the stock is held against.
    pub sku: SkuId,
    /// Quantity held.
    pub quantity: i64,
    /// Current lifecycle state.
    pub status: ReservationStatus,
    /// When the grant was issued.
    pub granted_at: DateTime<Utc>,
}

impl Reservation {
    /// Create a fresh `Granted` reservation.
    #[must_use]
    pub fn granted(sku: SkuId, quantity: i64) -> Self {
        Self {
            id: ReservationId::new(),
            sku,
            quantity,
            status: ReservationStatus::Granted,
            granted_at: Utc::now(),
        }
    }
}

/// Outcome of a [`reserve`](crate::coordinator::StockCoordinator::reserve) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock was held. `remaining` is the counter value after the debit.
    Granted {
        /// Identifier of the reservation record created for this grant.
        reservation: ReservationId,
        /// Counter value immediately after the decrement.
        remaining: i64,
    },
    /// Not enough stock left; the counter was not changed.
    SoldOut {
        /// Counter value observed by the failed decrement.
        available: i64,
    },
    /// The SKU has no live counter and no authoritative stock record.
    /// Terminal for this SKU; retrying will not help.
    NotFound,
}

impl ReserveOutcome {
    /// Collapse to the boolean the minimal consumer surface expects.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Outcome of a [`release`](crate::coordinator::StockCoordinator::release) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// This call won the `Granted → Released` transition.
    Released {
        /// Counter value after the credit, or `None` when the campaign
        /// counter had already expired and the credit was dropped.
        remaining: Option<i64>,
    },
    /// The reservation had already been released or committed; no stock
    /// was credited.
    AlreadyClosed {
        /// The terminal state the reservation was found in.
        status: ReservationStatus,
    },
    /// No reservation record exists for this identifier.
    NotFound,
}

/// Outcome of a [`commit`](crate::coordinator::StockCoordinator::commit) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// This call won the `Granted → Committed` transition.
    Committed,
    /// The reservation had already been released or committed.
    AlreadyClosed {
        /// The terminal state the reservation was found in.
        status: ReservationStatus,
    },
    /// No reservation record exists for this identifier.
    NotFound,
}

/// Outcome of an explicit [`resync`](crate::coordinator::StockCoordinator::resync).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// The counter now holds the ledger's current value.
    Seeded {
        /// The value read from the authoritative ledger.
        stock: i64,
    },
    /// The ledger has no record for this SKU.
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            ReservationStatus::Granted,
            ReservationStatus::Released,
            ReservationStatus::Committed,
        ] {
            assert_eq!(ReservationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReservationStatus::parse("pending"), None);
    }

    #[test]
    fn fresh_reservation_is_granted() {
        let reservation = Reservation::granted(SkuId::new(42), 3);
        assert_eq!(reservation.status, ReservationStatus::Granted);
        assert_eq!(reservation.sku, SkuId::new(42));
        assert_eq!(reservation.quantity, 3);
    }
}
