//! Price feed port.

use async_trait::async_trait;

use crate::domain::errors::WeaverResult;

/// Market price source used only by the prediction lifecycle tracker.
/// `Ok(None)` means the symbol is unknown to the feed this tick, which is
/// not an error: the record waits (and may still expire on time).
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn current_price(&self, symbol: &str, timeframe: &str) -> WeaverResult<Option<f64>>;
}
