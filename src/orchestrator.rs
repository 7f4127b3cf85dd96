use crate::collaborators::TokenSource;
use crate::governor::{BatchGovernor, GovernorOutcome};
use crate::native::NativeAssetRegistry;
use crate::progress::ProgressTracker;
use crate::repository::Token;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info};

pub const ALL_NETWORKS_KEY: &str = "processing-all";

pub fn network_key(chain_id: u64) -> String {
    format!("processing-{chain_id}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub networks: usize,
    pub tokens_processed: usize,
    pub prices_stored: usize,
    pub errors: usize,
    pub failed_networks: usize,
    pub elapsed: Duration,
}

impl PassSummary {
    fn absorb(&mut self, outcome: GovernorOutcome) {
        self.tokens_processed += outcome.processed;
        self.prices_stored += outcome.stored;
        self.errors += outcome.errors;
    }
}

/// Drives one refresh pass: discovery, then every network concurrently.
pub struct RefreshOrchestrator {
    source: Arc<dyn TokenSource>,
    governor: Arc<BatchGovernor>,
    registry: Arc<NativeAssetRegistry>,
    tracker: Arc<ProgressTracker>,
}

impl RefreshOrchestrator {
    pub fn new(
        source: Arc<dyn TokenSource>,
        governor: Arc<BatchGovernor>,
        registry: Arc<NativeAssetRegistry>,
        tracker: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            source,
            governor,
            registry,
            tracker,
        }
    }

    /// Only a discovery failure fails the pass. Network failures are counted
    /// in the summary.
    pub async fn run(&self, force_discovery: bool) -> Result<PassSummary> {
        let started = Instant::now();
        let networks = self
            .source
            .discover_all_tokens(force_discovery)
            .await
            .context("Token discovery failed")?;

        let pruned = self.tracker.prune_completed();
        if pruned > 0 {
            info!("Cleared {} completed progress entries", pruned);
        }

        info!(
            "Starting price refresh for {} networks (forced discovery: {})",
            networks.len(),
            force_discovery
        );
        self.tracker.start(
            ALL_NETWORKS_KEY,
            "Processing all networks",
            networks.len(),
            None,
        );

        let mut summary = PassSummary {
            networks: networks.len(),
            ..PassSummary::default()
        };

        let mut tasks = JoinSet::new();
        for (chain_id, tokens) in networks {
            let governor = self.governor.clone();
            let registry = self.registry.clone();
            let tracker = self.tracker.clone();
            tasks.spawn(async move {
                let outcome = process_network(&governor, &registry, &tracker, chain_id, tokens).await;
                tracker.increment(ALL_NETWORKS_KEY);
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) => {
                    error!("Network refresh task failed: {}", e);
                    summary.failed_networks += 1;
                    self.tracker.record_error(ALL_NETWORKS_KEY);
                    self.tracker.increment(ALL_NETWORKS_KEY);
                }
            }
        }

        self.tracker.complete(ALL_NETWORKS_KEY);
        summary.elapsed = started.elapsed();

        let stats = self.tracker.get_stats();
        info!(
            "Price refresh complete in {:?}: {} networks, {} tokens processed, {} prices stored, {} batch errors, {} failed networks (tracked errors: {})",
            summary.elapsed,
            summary.networks,
            summary.tokens_processed,
            summary.prices_stored,
            summary.errors,
            summary.failed_networks,
            stats.errors
        );

        Ok(summary)
    }
}

async fn process_network(
    governor: &BatchGovernor,
    registry: &NativeAssetRegistry,
    tracker: &ProgressTracker,
    chain_id: u64,
    mut tokens: Vec<Token>,
) -> GovernorOutcome {
    if tokens.is_empty() {
        info!("Chain {}: no tokens, skipping", chain_id);
        return GovernorOutcome::default();
    }

    registry.ensure_wrapped_token(chain_id, &mut tokens);

    let key = network_key(chain_id);
    tracker.start(
        &key,
        &format!("Chain {chain_id} prices"),
        tokens.len(),
        Some(chain_id),
    );
    let outcome = governor.run(chain_id, &key, &tokens).await;
    tracker.complete(&key);

    outcome
}
