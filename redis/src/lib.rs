//! # Flashstock Redis
//!
//! Redis-backed implementations of the flashstock provider traits:
//!
//! - [`RedisCounterStore`] — the hot-path campaign counter, with the
//!   conditional decrement and guarded credit executed as server-side
//!   Lua scripts so every mutation is atomic across all serving
//!   processes.
//! - [`RedisReservationStore`] — one Redis hash per reservation, with
//!   the `Granted → Released|Committed` transition executed as a Lua
//!   script so exactly one caller wins it.
//!
//! Both stores share a [`redis::aio::ConnectionManager`], which
//! multiplexes one connection and reconnects on failure.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod counter;
pub mod reservations;

pub use counter::RedisCounterStore;
pub use reservations::RedisReservationStore;

use flashstock_core::error::{Result, StockError};
use redis::aio::ConnectionManager;

/// Open a connection manager for the given Redis URL.
///
/// # Errors
///
/// Returns [`StockError::Unavailable`] if the client cannot be created
/// or the initial connection fails.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(redis_url)
        .map_err(|e| StockError::unavailable(format!("failed to create Redis client: {e}")))?;

    ConnectionManager::new(client)
        .await
        .map_err(|e| StockError::unavailable(format!("failed to connect to Redis: {e}")))
}
