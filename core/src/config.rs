//! Stock coordinator configuration.
//!
//! Configuration values are plain data provided by the application; the
//! defaults match the campaign parameters observed in production
//! (24-hour campaign window, `seckill:stock:` key prefix).

use crate::state::SkuId;
use std::time::Duration;

/// Configuration for the stock coordinator and its counter keys.
#[derive(Debug, Clone)]
pub struct StockConfig {
    /// Prefix for campaign counter keys in the counter store.
    ///
    /// Key construction is owned here so campaign state is a managed
    /// resource, not an ad hoc string convention at call sites.
    pub key_prefix: String,

    /// Campaign counter time-to-live.
    ///
    /// Default: 24 hours
    pub campaign_ttl: Duration,

    /// Reservation record time-to-live.
    ///
    /// Must outlive the campaign so late releases can still find their
    /// record. Default: 24 hours
    pub reservation_ttl: Duration,

    /// Upper bound on any single counter-store or ledger round trip.
    ///
    /// An elapsed timer fails closed as
    /// [`StockError::Unavailable`](crate::error::StockError::Unavailable).
    /// Default: 2 seconds
    pub op_timeout: Duration,
}

impl StockConfig {
    /// Create a configuration with the production defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            key_prefix: "seckill:stock:".to_string(),
            campaign_ttl: Duration::from_secs(24 * 60 * 60),
            reservation_ttl: Duration::from_secs(24 * 60 * 60),
            op_timeout: Duration::from_secs(2),
        }
    }

    /// Set the counter key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the campaign counter time-to-live.
    #[must_use]
    pub const fn with_campaign_ttl(mut self, ttl: Duration) -> Self {
        self.campaign_ttl = ttl;
        self
    }

    /// Set the reservation record time-to-live.
    #[must_use]
    pub const fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Set the per-call operation timeout.
    #[must_use]
    pub const fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Build the campaign counter key for a SKU.
    #[must_use]
    pub fn stock_key(&self, sku: SkuId) -> String {
        format!("{}{sku}", self.key_prefix)
    }
}

impl Default for StockConfig {
    fn default() -> Self {
        Self::new()
    }
}
