use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A token known on a single network. Identity is `(chain_id, address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMetadata {
    pub symbol: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub chain_id: u64,
    pub address: Address,
    pub price: f64,
    pub metadata: Option<PriceMetadata>,
}

impl PriceRecord {
    /// Same record, re-keyed to another address.
    pub fn with_address(&self, address: Address) -> Self {
        Self {
            address,
            ..self.clone()
        }
    }
}

/// Tokens per chain id, each list in discovery order.
pub type NetworkTokenSet = BTreeMap<u64, Vec<Token>>;

/// Fetch results for one batch, keyed by token address.
pub type PriceMap = HashMap<Address, PriceRecord>;

/// A price row as persisted in the cache.
#[derive(Debug, Clone)]
pub struct StoredPrice {
    pub chain_id: u64,
    pub address: Address,
    pub price: f64,
    pub symbol: Option<String>,
    pub source: Option<String>,
    pub updated_at: u64,
}
