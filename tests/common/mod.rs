#![allow(dead_code)]

use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use token_price_indexer::collaborators::{PriceFetcher, PriceStore, TokenSource};
use token_price_indexer::governor::{BatchGovernor, BatchSettings};
use token_price_indexer::native::NativeAssetRegistry;
use token_price_indexer::orchestrator::RefreshOrchestrator;
use token_price_indexer::progress::ProgressTracker;
use token_price_indexer::repository::{NetworkTokenSet, PriceMap, PriceRecord, Token};

pub fn token_address(index: usize) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&(index as u64 + 1).to_be_bytes());
    Address::from(bytes)
}

pub fn tokens(chain_id: u64, count: usize) -> Vec<Token> {
    (0..count)
        .map(|i| Token {
            chain_id,
            address: token_address(i),
            symbol: format!("T{i}"),
            name: format!("Token {i}"),
            decimals: 18,
        })
        .collect()
}

/// Returns a fixed token set, recording every `force_refresh` flag it sees.
#[derive(Default)]
pub struct StaticSource {
    pub networks: NetworkTokenSet,
    pub fail: bool,
    calls: Mutex<Vec<bool>>,
}

impl StaticSource {
    pub fn new(networks: NetworkTokenSet) -> Self {
        Self {
            networks,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenSource for StaticSource {
    async fn discover_all_tokens(&self, force_refresh: bool) -> Result<NetworkTokenSet> {
        self.calls.lock().unwrap().push(force_refresh);
        if self.fail {
            anyhow::bail!("token list unavailable");
        }
        Ok(self.networks.clone())
    }
}

/// Prices every token at `price_of(address)` except those in `unpriced`.
/// Batches containing a token in `fail_on`, or any batch for a chain in
/// `failing_chains`, fail as a whole.
#[derive(Default)]
pub struct MockFetcher {
    pub fail_on: HashSet<Address>,
    pub unpriced: HashSet<Address>,
    pub failing_chains: HashSet<u64>,
    pub delay: Duration,
    pub observe: Option<(Arc<ProgressTracker>, String)>,
    pub batches: Mutex<Vec<(u64, usize)>>,
    pub observed_progress: Mutex<Vec<usize>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn price_of(address: &Address) -> f64 {
        address.0[19] as f64 + 0.5
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(|(_, n)| *n).collect()
    }
}

#[async_trait]
impl PriceFetcher for MockFetcher {
    async fn fetch_prices(&self, chain_id: u64, tokens: &[Token]) -> Result<PriceMap> {
        self.batches.lock().unwrap().push((chain_id, tokens.len()));
        if let Some((tracker, key)) = &self.observe {
            let processed = tracker.snapshot(key).map(|s| s.processed).unwrap_or(0);
            self.observed_progress.lock().unwrap().push(processed);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_chains.contains(&chain_id) {
            anyhow::bail!("rpc unavailable for chain {chain_id}");
        }
        if tokens.iter().any(|t| self.fail_on.contains(&t.address)) {
            anyhow::bail!("upstream error");
        }

        Ok(tokens
            .iter()
            .filter(|t| !self.unpriced.contains(&t.address))
            .map(|t| {
                (
                    t.address,
                    PriceRecord {
                        chain_id,
                        address: t.address,
                        price: Self::price_of(&t.address),
                        metadata: None,
                    },
                )
            })
            .collect())
    }
}

/// Keeps everything it is asked to store.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<PriceRecord>>,
    pub fail_chain: Option<u64>,
}

impl MemoryStore {
    pub fn find(&self, chain_id: u64, address: Address) -> Option<PriceRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.chain_id == chain_id && r.address == address)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn store_prices(&self, chain_id: u64, records: Vec<PriceRecord>) -> Result<usize> {
        if self.fail_chain == Some(chain_id) {
            anyhow::bail!("disk full");
        }
        let written = records.len();
        self.records.lock().unwrap().extend(records);
        Ok(written)
    }
}

pub fn settings(batch_size: usize, group_size: usize) -> BatchSettings {
    BatchSettings {
        batch_size,
        group_size,
        group_delay: Duration::from_millis(200),
        batch_timeout: Duration::from_secs(30),
    }
}

pub fn governor(
    fetcher: Arc<MockFetcher>,
    store: Arc<dyn PriceStore>,
    tracker: Arc<ProgressTracker>,
    settings: BatchSettings,
) -> Arc<BatchGovernor> {
    Arc::new(BatchGovernor::new(
        fetcher,
        store,
        Arc::new(NativeAssetRegistry::default()),
        tracker,
        settings,
    ))
}

pub fn orchestrator(
    source: Arc<StaticSource>,
    fetcher: Arc<MockFetcher>,
    store: Arc<dyn PriceStore>,
    tracker: Arc<ProgressTracker>,
) -> Arc<RefreshOrchestrator> {
    let governor = governor(fetcher, store, tracker.clone(), settings(500, 3));
    Arc::new(RefreshOrchestrator::new(
        source,
        governor,
        Arc::new(NativeAssetRegistry::default()),
        tracker,
    ))
}
