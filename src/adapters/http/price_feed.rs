//! HTTP price feed adapter.
//!
//! Thin client over a JSON quote endpoint:
//! `GET {base_url}/price?symbol=BTC&timeframe=1h` -> `{"price": 64250.5}`.
//! A 404 means the feed does not know the symbol this tick, which the
//! tracker treats as "wait", not as an error.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::errors::{WeaverError, WeaverResult};
use crate::domain::models::PriceFeedConfig;
use crate::domain::ports::PriceFeed;
use crate::infrastructure::RetryPolicy;

#[derive(Debug, Clone)]
pub struct HttpPriceFeed {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    price: f64,
}

impl HttpPriceFeed {
    pub fn new(config: &PriceFeedConfig) -> WeaverResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WeaverError::PriceFeed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            // Keep the budget well under one poll interval so a dead feed
            // stalls a single tick, not the whole sweep.
            retry: RetryPolicy::new(200, 2_000, 10_000),
        })
    }

    async fn fetch_quote(&self, symbol: &str, timeframe: &str) -> WeaverResult<Option<f64>> {
        let url = format!("{}/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("timeframe", timeframe)])
            .send()
            .await
            .map_err(|e| WeaverError::PriceFeed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| WeaverError::PriceFeed(e.to_string()))?;

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| WeaverError::PriceFeed(e.to_string()))?;

        if !quote.price.is_finite() || quote.price <= 0.0 {
            return Err(WeaverError::PriceFeed(format!(
                "non-positive quote for {symbol}: {}",
                quote.price
            )));
        }

        Ok(Some(quote.price))
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn current_price(&self, symbol: &str, timeframe: &str) -> WeaverResult<Option<f64>> {
        self.retry
            .execute("price_feed", || self.fetch_quote(symbol, timeframe))
            .await
    }
}
