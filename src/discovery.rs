use crate::collaborators::TokenSource;
use crate::repository::{Database, NetworkTokenSet, Token, TokenRepository};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct TokenList {
    tokens: Vec<TokenListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenListEntry {
    chain_id: u64,
    address: String,
    symbol: String,
    name: String,
    decimals: u8,
}

/// Parses a token list, keeping the first entry per `(chain_id, address)`.
/// Entries with malformed addresses or outside `chains` are dropped.
fn parse_token_list(raw: &str, chains: Option<&BTreeSet<u64>>) -> Result<NetworkTokenSet> {
    let list: TokenList = serde_json::from_str(raw).context("Malformed token list")?;
    let mut seen = HashSet::new();
    let mut networks = NetworkTokenSet::new();

    for entry in list.tokens {
        if chains.is_some_and(|chains| !chains.contains(&entry.chain_id)) {
            continue;
        }
        let address = match Address::from_str(entry.address.trim()) {
            Ok(address) => address,
            Err(e) => {
                warn!(
                    "Skipping {} on chain {}: invalid address {}: {}",
                    entry.symbol, entry.chain_id, entry.address, e
                );
                continue;
            }
        };
        if !seen.insert((entry.chain_id, address)) {
            continue;
        }

        networks.entry(entry.chain_id).or_default().push(Token {
            chain_id: entry.chain_id,
            address,
            symbol: entry.symbol,
            name: entry.name,
            decimals: entry.decimals,
        });
    }

    Ok(networks)
}

/// Discovers tokens from a token-list JSON file and remembers them in the
/// `tokens` table.
pub struct TokenListSource {
    path: PathBuf,
    db: Database,
    chains: Option<BTreeSet<u64>>,
    cache: RwLock<Option<NetworkTokenSet>>,
}

impl TokenListSource {
    pub fn new(path: impl Into<PathBuf>, db: Database) -> Self {
        Self {
            path: path.into(),
            db,
            chains: None,
            cache: RwLock::new(None),
        }
    }

    /// Limits discovery to the given networks.
    pub fn with_chains(mut self, chains: impl IntoIterator<Item = u64>) -> Self {
        self.chains = Some(chains.into_iter().collect());
        self
    }

    async fn read_list(&self) -> Result<NetworkTokenSet> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read token list {}", self.path.display()))?;
        parse_token_list(&raw, self.chains.as_ref())
    }

    async fn persist(&self, networks: &NetworkTokenSet) -> Result<usize> {
        let db = self.db.clone();
        let tokens: Vec<Token> = networks.values().flatten().cloned().collect();
        tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| TokenRepository::new(conn).insert_batch(&tokens))
        })
        .await?
    }

    async fn load_persisted(&self) -> Result<NetworkTokenSet> {
        let db = self.db.clone();
        let mut networks =
            tokio::task::spawn_blocking(move || db.with_conn(|conn| TokenRepository::new(conn).load_all()))
                .await??;
        if let Some(chains) = &self.chains {
            networks.retain(|chain_id, _| chains.contains(chain_id));
        }
        Ok(networks)
    }
}

#[async_trait]
impl TokenSource for TokenListSource {
    async fn discover_all_tokens(&self, force_refresh: bool) -> Result<NetworkTokenSet> {
        if !force_refresh {
            if let Some(cached) = self.cache.read().await.as_ref() {
                return Ok(cached.clone());
            }

            let persisted = self.load_persisted().await?;
            if !persisted.is_empty() {
                info!(
                    "Loaded {} networks from token cache",
                    persisted.len()
                );
                *self.cache.write().await = Some(persisted.clone());
                return Ok(persisted);
            }
        }

        let networks = self.read_list().await?;
        let total: usize = networks.values().map(Vec::len).sum();
        let inserted = self.persist(&networks).await?;
        info!(
            "Discovered {} tokens across {} networks ({} new)",
            total,
            networks.len(),
            inserted
        );

        *self.cache.write().await = Some(networks.clone());
        Ok(networks)
    }
}
