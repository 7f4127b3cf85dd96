//! Boundaries between the refresh engine and the systems it drives.

use crate::repository::{NetworkTokenSet, PriceMap, PriceRecord, Token};
use anyhow::Result;
use async_trait::async_trait;

/// Enumerates the tokens known per network.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// With `force_refresh` false an implementation may answer from its own
    /// cache. Must be safe to call repeatedly.
    async fn discover_all_tokens(&self, force_refresh: bool) -> Result<NetworkTokenSet>;
}

/// Prices a batch of tokens on one network.
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    /// Tokens that could not be priced are left out of the result. An `Err`
    /// means the whole batch failed.
    async fn fetch_prices(&self, chain_id: u64, tokens: &[Token]) -> Result<PriceMap>;
}

/// Durable price cache. Last write per `(chain_id, address)` wins.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn store_prices(&self, chain_id: u64, records: Vec<PriceRecord>) -> Result<usize>;
}
