use crate::collaborators::{PriceFetcher, PriceStore};
use crate::native::NativeAssetRegistry;
use crate::progress::ProgressTracker;
use crate::repository::Token;
use anyhow::{Context, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_GROUP_SIZE: usize = 3;
pub const DEFAULT_GROUP_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    /// Tokens per fetch call.
    pub batch_size: usize,
    /// Batches in flight at once.
    pub group_size: usize,
    /// Pause between groups.
    pub group_delay: Duration,
    /// Upper bound on one batch's fetch.
    pub batch_timeout: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            group_size: DEFAULT_GROUP_SIZE,
            group_delay: DEFAULT_GROUP_DELAY,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GovernorOutcome {
    pub processed: usize,
    pub errors: usize,
    pub stored: usize,
}

/// Consecutive slices of at most `batch_size` items. Empty for empty input.
pub fn split_batches<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.max(1)).collect()
}

/// Consecutive runs of at most `group_size` batches.
pub fn group_batches<'a, 'b, T>(batches: &'b [&'a [T]], group_size: usize) -> Vec<&'b [&'a [T]]> {
    batches.chunks(group_size.max(1)).collect()
}

/// Runs fetch-alias-store cycles over a network's tokens, a bounded number of
/// batches at a time.
pub struct BatchGovernor {
    fetcher: Arc<dyn PriceFetcher>,
    store: Arc<dyn PriceStore>,
    registry: Arc<NativeAssetRegistry>,
    tracker: Arc<ProgressTracker>,
    settings: BatchSettings,
}

impl BatchGovernor {
    pub fn new(
        fetcher: Arc<dyn PriceFetcher>,
        store: Arc<dyn PriceStore>,
        registry: Arc<NativeAssetRegistry>,
        tracker: Arc<ProgressTracker>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            fetcher,
            store,
            registry,
            tracker,
            settings,
        }
    }

    /// Processes `tokens` group by group, reporting cumulative progress under
    /// `progress_key` after each group. Batch failures are counted, never
    /// propagated.
    pub async fn run(&self, chain_id: u64, progress_key: &str, tokens: &[Token]) -> GovernorOutcome {
        let total = tokens.len();
        let batches = split_batches(tokens, self.settings.batch_size);
        let groups = group_batches(&batches, self.settings.group_size);
        let mut outcome = GovernorOutcome::default();

        info!(
            "Chain {}: {} tokens in {} batches, {} groups",
            chain_id,
            total,
            batches.len(),
            groups.len()
        );

        for (index, group) in groups.iter().enumerate() {
            let group_start = Instant::now();
            let results = join_all(
                group
                    .iter()
                    .map(|batch| self.process_batch(chain_id, batch)),
            )
            .await;

            for (batch, result) in group.iter().zip(results) {
                match result {
                    Ok(stored) => outcome.stored += stored,
                    Err(e) => {
                        outcome.errors += 1;
                        self.tracker.record_error(progress_key);
                        warn!(
                            "Chain {}: batch of {} tokens failed: {:#}",
                            chain_id,
                            batch.len(),
                            e
                        );
                    }
                }
            }

            let group_tokens: usize = group.iter().map(|batch| batch.len()).sum();
            outcome.processed = (outcome.processed + group_tokens).min(total);
            self.tracker.update(progress_key, outcome.processed);

            info!(
                "Chain {}: group {}/{} done in {:?}, {}/{} tokens processed",
                chain_id,
                index + 1,
                groups.len(),
                group_start.elapsed(),
                outcome.processed,
                total
            );

            if index + 1 < groups.len() {
                sleep(self.settings.group_delay).await;
            }
        }

        outcome
    }

    async fn process_batch(&self, chain_id: u64, batch: &[Token]) -> Result<usize> {
        let mut prices = timeout(
            self.settings.batch_timeout,
            self.fetcher.fetch_prices(chain_id, batch),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "Price fetch timed out after {:?}",
                self.settings.batch_timeout
            )
        })?
        .context("Price fetch failed")?;

        if self.registry.apply_alias(chain_id, &mut prices) {
            debug!("Chain {}: added native asset alias", chain_id);
        }

        if prices.is_empty() {
            debug!("Chain {}: no prices resolved for batch", chain_id);
            return Ok(0);
        }

        let records = prices.into_values().collect();
        self.store
            .store_prices(chain_id, records)
            .await
            .context("Price store failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_batches_sizes() {
        let items: Vec<u32> = (0..1200).collect();
        let batches = split_batches(&items, 500);
        let sizes: Vec<_> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![500, 500, 200]);
        assert_eq!(batches[2][0], 1000);

        let exact: Vec<u32> = (0..1000).collect();
        let sizes: Vec<_> = split_batches(&exact, 500).iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![500, 500]);

        assert!(split_batches::<u32>(&[], 500).is_empty());
    }

    #[test]
    fn test_split_batches_count_is_ceiling() {
        for n in [1usize, 7, 499, 500, 501, 1499, 1500, 1501] {
            let items = vec![0u8; n];
            let batches = split_batches(&items, 500);
            assert_eq!(batches.len(), n.div_ceil(500), "n = {n}");
            assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 500));
            assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), n);
        }
    }

    #[test]
    fn test_group_batches() {
        let items: Vec<u32> = (0..3500).collect();
        let batches = split_batches(&items, 500);
        let groups = group_batches(&batches, 3);
        let sizes: Vec<_> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_zero_sizes_do_not_panic() {
        let items = [1, 2, 3];
        let batches = split_batches(&items, 0);
        assert_eq!(batches.len(), 3);
        assert_eq!(group_batches(&batches, 0).len(), 3);
    }
}
