use crate::collaborators::PriceFetcher;
use crate::config::NetworkConfig;
use crate::contracts::getAmountsOutCall;
use crate::native::NativeAssetRegistry;
use crate::repository::{PriceMap, PriceMetadata, PriceRecord, Token};
use crate::rpc::RpcClient;
use alloy_primitives::utils::format_units;
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{FutureExt, StreamExt, stream};
use std::collections::HashMap;
use tracing::debug;

const PRICE_SOURCE: &str = "uniswap-v2";

/// Quotes tokens against one network's router.
struct ChainQuoter {
    client: RpcClient,
    router: Address,
    quote_token: Address,
    quote_decimals: u8,
    wrapped_native: Option<Address>,
}

impl ChainQuoter {
    async fn quote(&self, token: &Token) -> Result<f64> {
        if token.address == self.quote_token {
            return Ok(1.0);
        }

        let amount_in = U256::from(10u64).pow(U256::from(token.decimals));
        let direct = vec![token.address, self.quote_token];

        let amount_out = match self.amount_out(amount_in, direct).await {
            Ok(amount) => amount,
            Err(direct_err) => match self.wrapped_native.filter(|w| *w != token.address) {
                Some(wrapped) => {
                    let via_native = vec![token.address, wrapped, self.quote_token];
                    self.amount_out(amount_in, via_native)
                        .await
                        .with_context(|| format!("direct route failed too: {direct_err:#}"))?
                }
                None => return Err(direct_err),
            },
        };

        let formatted = format_units(amount_out, self.quote_decimals)?;
        formatted
            .parse::<f64>()
            .with_context(|| format!("Unparseable quote {formatted}"))
    }

    async fn amount_out(&self, amount_in: U256, path: Vec<Address>) -> Result<U256> {
        let amounts = self
            .client
            .call_contract(
                self.router,
                getAmountsOutCall {
                    amountIn: amount_in,
                    path,
                },
            )
            .await?;

        match amounts.last() {
            Some(amount) if !amount.is_zero() => Ok(*amount),
            _ => anyhow::bail!("Router returned no liquidity"),
        }
    }
}

/// Prices tokens by quoting one unit of each against a USD stablecoin on a
/// Uniswap-V2-style router, falling back to a route through the wrapped
/// native token.
pub struct OnchainPriceFetcher {
    chains: HashMap<u64, ChainQuoter>,
    concurrency: usize,
}

impl OnchainPriceFetcher {
    pub fn new(
        networks: &[NetworkConfig],
        registry: &NativeAssetRegistry,
        concurrency: usize,
    ) -> Result<Self> {
        let mut chains = HashMap::new();
        for network in networks {
            let client = RpcClient::new(network.chain_id, &network.rpc_urls)
                .with_context(|| format!("Failed to set up RPC for {}", network.name))?;
            chains.insert(
                network.chain_id,
                ChainQuoter {
                    client,
                    router: network.router,
                    quote_token: network.quote_token,
                    quote_decimals: network.quote_decimals,
                    wrapped_native: registry
                        .wrapped_native(network.chain_id)
                        .map(|w| w.address),
                },
            );
        }

        Ok(Self {
            chains,
            concurrency: concurrency.max(1),
        })
    }
}

#[async_trait]
impl PriceFetcher for OnchainPriceFetcher {
    async fn fetch_prices(&self, chain_id: u64, tokens: &[Token]) -> Result<PriceMap> {
        let quoter = self
            .chains
            .get(&chain_id)
            .ok_or_else(|| anyhow::anyhow!("No RPC configured for chain {}", chain_id))?;

        let futures: Vec<_> = tokens
            .iter()
            .map(|token| async move { (token, quoter.quote(token).await) }.boxed())
            .collect();
        let quotes: Vec<_> = stream::iter(futures)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut prices = PriceMap::with_capacity(quotes.len());
        for (token, quote) in quotes {
            match quote {
                Ok(price) => {
                    prices.insert(
                        token.address,
                        PriceRecord {
                            chain_id,
                            address: token.address,
                            price,
                            metadata: Some(PriceMetadata {
                                symbol: Some(token.symbol.clone()),
                                source: PRICE_SOURCE.to_string(),
                            }),
                        },
                    );
                }
                Err(e) => debug!(
                    "Chain {}: no price for {} ({:?}): {:#}",
                    chain_id, token.symbol, token.address, e
                ),
            }
        }

        debug!(
            "Chain {}: priced {}/{} tokens",
            chain_id,
            prices.len(),
            tokens.len()
        );
        Ok(prices)
    }
}
