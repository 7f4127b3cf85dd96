use crate::governor::{BatchSettings, DEFAULT_BATCH_TIMEOUT, DEFAULT_GROUP_DELAY};
use crate::native::{NativeAssetRegistry, WrappedNative};
use crate::scheduler::{DEFAULT_REDISCOVERY_WINDOW, DEFAULT_REFRESH_INTERVAL};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_FETCH_CONCURRENCY: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub token_list_path: PathBuf,
    pub networks_path: PathBuf,
    pub refresh_interval: Duration,
    pub rediscovery_window: Duration,
    pub batch: BatchSettings,
    pub fetch_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:./prices.db".to_string());
        let token_list_path = lookup("TOKEN_LIST_PATH")
            .unwrap_or_else(|| "./tokens.json".to_string())
            .into();
        let networks_path = lookup("NETWORKS_CONFIG")
            .unwrap_or_else(|| "./networks.json".to_string())
            .into();

        let millis = |key: &str, default: Duration| -> Result<Duration> {
            Ok(lookup(key)
                .map(|v| v.parse::<u64>().with_context(|| format!("Invalid {key}: {v}")))
                .transpose()?
                .map(Duration::from_millis)
                .unwrap_or(default))
        };
        let count = |key: &str, default: usize| -> Result<usize> {
            let value = lookup(key)
                .map(|v| v.parse::<usize>().with_context(|| format!("Invalid {key}: {v}")))
                .transpose()?
                .unwrap_or(default);
            if value == 0 {
                anyhow::bail!("{key} must be greater than zero");
            }
            Ok(value)
        };

        let refresh_interval = millis("REFRESH_INTERVAL_MS", DEFAULT_REFRESH_INTERVAL)?;
        if refresh_interval.is_zero() {
            anyhow::bail!("REFRESH_INTERVAL_MS must be greater than zero");
        }

        let defaults = BatchSettings::default();
        let batch = BatchSettings {
            batch_size: count("BATCH_SIZE", defaults.batch_size)?,
            group_size: count("GROUP_SIZE", defaults.group_size)?,
            group_delay: millis("GROUP_DELAY_MS", DEFAULT_GROUP_DELAY)?,
            batch_timeout: millis("BATCH_TIMEOUT_MS", DEFAULT_BATCH_TIMEOUT)?,
        };

        Ok(Config {
            database_url,
            token_list_path,
            networks_path,
            refresh_interval,
            rediscovery_window: millis("REDISCOVERY_WINDOW_MS", DEFAULT_REDISCOVERY_WINDOW)?,
            batch,
            fetch_concurrency: count("FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY)?,
        })
    }
}

/// Per-network settings loaded from the networks file.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub name: String,
    pub rpc_urls: Vec<String>,
    /// Uniswap-V2-style router used for quotes.
    pub router: Address,
    /// USD stablecoin prices are quoted in.
    pub quote_token: Address,
    pub quote_decimals: u8,
    #[serde(default)]
    pub wrapped_native: Option<WrappedNative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworksConfig {
    #[serde(default)]
    pub zero_address: Option<Address>,
    pub networks: Vec<NetworkConfig>,
}

impl NetworksConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read networks config {}", path.display()))?;
        Self::from_str(&raw).with_context(|| format!("Invalid networks config {}", path.display()))
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.networks.iter().map(|n| n.chain_id).collect()
    }

    /// Built-in wrapped-native table, extended and overridden by this file.
    pub fn native_registry(&self) -> NativeAssetRegistry {
        let mut registry = NativeAssetRegistry::default();
        if let Some(zero_address) = self.zero_address {
            registry = registry.with_zero_address(zero_address);
        }
        for network in &self.networks {
            if let Some(wrapped) = &network.wrapped_native {
                registry.register(network.chain_id, wrapped.clone());
            }
        }
        registry
    }
}

impl FromStr for NetworksConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: NetworksConfig = serde_json::from_str(s)?;
        for network in &config.networks {
            if network.rpc_urls.is_empty() {
                anyhow::bail!("Network {} has no rpc_urls", network.chain_id);
            }
        }
        Ok(config)
    }
}
