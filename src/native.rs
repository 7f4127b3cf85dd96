use crate::repository::{PriceMap, Token};
use alloy_primitives::{Address, address};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WrappedNative {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl WrappedNative {
    fn new(address: Address, symbol: &str, name: &str) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals: 18,
        }
    }
}

/// Networks whose native coin is priced through its wrapped token, and the
/// reserved address the native coin is cached under.
#[derive(Debug, Clone)]
pub struct NativeAssetRegistry {
    zero_address: Address,
    wrapped: HashMap<u64, WrappedNative>,
}

impl Default for NativeAssetRegistry {
    fn default() -> Self {
        let wrapped = [
            (
                1,
                WrappedNative::new(
                    address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
                    "WETH",
                    "Wrapped Ether",
                ),
            ),
            (
                10,
                WrappedNative::new(
                    address!("4200000000000000000000000000000000000006"),
                    "WETH",
                    "Wrapped Ether",
                ),
            ),
            (
                56,
                WrappedNative::new(
                    address!("bb4cdb9cbd36b01bd1cbaebf2de08d9173bc095c"),
                    "WBNB",
                    "Wrapped BNB",
                ),
            ),
            (
                137,
                WrappedNative::new(
                    address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),
                    "WPOL",
                    "Wrapped Polygon Ecosystem Token",
                ),
            ),
            (
                8453,
                WrappedNative::new(
                    address!("4200000000000000000000000000000000000006"),
                    "WETH",
                    "Wrapped Ether",
                ),
            ),
            (
                42161,
                WrappedNative::new(
                    address!("82af49447d8a07e3bd95bd0d56f35241523fbab1"),
                    "WETH",
                    "Wrapped Ether",
                ),
            ),
            (
                43114,
                WrappedNative::new(
                    address!("b31f66aa3c1e785363f0875a1b74e27b85fd66c7"),
                    "WAVAX",
                    "Wrapped AVAX",
                ),
            ),
        ]
        .into_iter()
        .collect();

        Self {
            zero_address: Address::ZERO,
            wrapped,
        }
    }
}

impl NativeAssetRegistry {
    pub fn empty(zero_address: Address) -> Self {
        Self {
            zero_address,
            wrapped: HashMap::new(),
        }
    }

    pub fn with_zero_address(mut self, zero_address: Address) -> Self {
        self.zero_address = zero_address;
        self
    }

    /// Registers or replaces the wrapped-native token for `chain_id`.
    pub fn register(&mut self, chain_id: u64, wrapped: WrappedNative) {
        self.wrapped.insert(chain_id, wrapped);
    }

    pub fn zero_address(&self) -> Address {
        self.zero_address
    }

    pub fn wrapped_native(&self, chain_id: u64) -> Option<&WrappedNative> {
        self.wrapped.get(&chain_id)
    }

    /// Appends the wrapped-native token to `tokens` when the network is
    /// registered and the token is missing, so the fetcher prices it.
    pub fn ensure_wrapped_token(&self, chain_id: u64, tokens: &mut Vec<Token>) -> bool {
        let Some(wrapped) = self.wrapped.get(&chain_id) else {
            return false;
        };

        // Address equality is byte-wise, so any hex casing in the source matches.
        if tokens.iter().any(|t| t.address == wrapped.address) {
            return false;
        }

        debug!(
            "Adding {} ({:?}) to chain {} token set",
            wrapped.symbol, wrapped.address, chain_id
        );
        tokens.push(Token {
            chain_id,
            address: wrapped.address,
            symbol: wrapped.symbol.clone(),
            name: wrapped.name.clone(),
            decimals: wrapped.decimals,
        });
        true
    }

    /// Copies the wrapped-native price to the zero address. Never overwrites
    /// a record already keyed by the zero address. Returns whether an alias
    /// was added.
    pub fn apply_alias(&self, chain_id: u64, prices: &mut PriceMap) -> bool {
        let Some(wrapped) = self.wrapped.get(&chain_id) else {
            return false;
        };
        if prices.contains_key(&self.zero_address) {
            return false;
        }
        let Some(alias) = prices
            .get(&wrapped.address)
            .map(|record| record.with_address(self.zero_address))
        else {
            return false;
        };

        prices.insert(self.zero_address, alias);
        true
    }
}
