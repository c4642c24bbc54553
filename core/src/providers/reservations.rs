//! Reservation store trait.

use crate::error::Result;
use crate::state::{Reservation, ReservationId, ReservationStatus};
use std::future::Future;
use std::time::Duration;

/// Result of a reservation state transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// This caller won the transition; the returned record carries the
    /// new status.
    Applied(Reservation),
    /// The reservation had already left `Granted`; nothing changed.
    Conflict {
        /// The state the reservation was found in.
        current: ReservationStatus,
    },
    /// No record exists for this identifier.
    Missing,
}

/// Store for reservation records.
///
/// Reservations turn anonymous counter mutations into identified
/// entities: each grant is recorded with a unique id, and leaving the
/// `Granted` state is a single-winner transition. Two concurrent
/// `release` calls for one id can therefore never both credit stock.
pub trait ReservationStore: Send + Sync {
    /// Record a fresh `Granted` reservation.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or a record with this
    /// id already exists.
    fn insert(
        &self,
        reservation: &Reservation,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Atomically move the reservation from `Granted` to `to`.
    ///
    /// `to` must be a terminal state (`Released` or `Committed`). The
    /// transition applies only when the record is currently `Granted`;
    /// concurrent callers see [`TransitionOutcome::Conflict`].
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or the stored record
    /// cannot be decoded.
    fn transition(
        &self,
        id: ReservationId,
        to: ReservationStatus,
    ) -> impl Future<Output = Result<TransitionOutcome>> + Send;

    /// Fetch a reservation record.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or the stored record
    /// cannot be decoded.
    fn get(
        &self,
        id: ReservationId,
    ) -> impl Future<Output = Result<Option<Reservation>>> + Send;
}
