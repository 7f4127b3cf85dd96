mod common;

use alloy_primitives::{Address, address};
use common::{MemoryStore, MockFetcher, StaticSource, orchestrator, tokens};
use std::sync::Arc;
use token_price_indexer::orchestrator::{ALL_NETWORKS_KEY, network_key};
use token_price_indexer::progress::ProgressTracker;
use token_price_indexer::repository::{Database, NetworkTokenSet, PriceRepository};
use token_price_indexer::store::SqlitePriceStore;

const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

#[tokio::test]
async fn test_wrapped_native_added_and_aliased() {
    let networks: NetworkTokenSet = [(1, tokens(1, 10))].into_iter().collect();
    let source = Arc::new(StaticSource::new(networks));
    let fetcher = Arc::new(MockFetcher::default());
    let db = Database::in_memory().unwrap();
    let store = Arc::new(SqlitePriceStore::new(db.clone()));
    let tracker = Arc::new(ProgressTracker::new());

    let summary = orchestrator(source, fetcher.clone(), store, tracker.clone())
        .run(true)
        .await
        .unwrap();

    // 10 listed tokens plus WETH, stored together with the native alias.
    assert_eq!(fetcher.batch_sizes(), vec![11]);
    assert_eq!(summary.tokens_processed, 11);
    assert_eq!(summary.prices_stored, 12);
    assert_eq!(summary.errors, 0);

    let (weth, native) = db
        .with_conn(|conn| {
            let repo = PriceRepository::new(conn);
            Ok((repo.get_price(1, &WETH)?, repo.get_price(1, &Address::ZERO)?))
        })
        .unwrap();
    let weth = weth.expect("WETH price stored");
    let native = native.expect("native alias stored");
    assert_eq!(native.price, weth.price);
    assert_eq!(native.price, MockFetcher::price_of(&WETH));
    assert_eq!(native.address, Address::ZERO);

    let network = tracker.snapshot(&network_key(1)).unwrap();
    assert_eq!((network.total, network.processed), (11, 11));
    assert!(network.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_no_alias_without_wrapped_price() {
    let networks: NetworkTokenSet = [(1, tokens(1, 3))].into_iter().collect();
    let source = Arc::new(StaticSource::new(networks));
    let fetcher = Arc::new(MockFetcher {
        unpriced: [WETH].into_iter().collect(),
        ..MockFetcher::default()
    });
    let store = Arc::new(MemoryStore::default());
    let tracker = Arc::new(ProgressTracker::new());

    let summary = orchestrator(source, fetcher.clone(), store.clone(), tracker)
        .run(false)
        .await
        .unwrap();

    assert_eq!(fetcher.batch_sizes(), vec![4]);
    assert_eq!(summary.errors, 0);
    assert_eq!(store.count(), 3);
    assert!(store.find(1, WETH).is_none());
    assert!(store.find(1, Address::ZERO).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_network_failures_do_not_block_others() {
    let networks: NetworkTokenSet = [
        (1, tokens(1, 1200)),
        (56, tokens(56, 700)),
        (999, tokens(999, 40)),
        (10, Vec::new()),
    ]
    .into_iter()
    .collect();
    let source = Arc::new(StaticSource::new(networks));
    let fetcher = Arc::new(MockFetcher {
        failing_chains: [56].into_iter().collect(),
        ..MockFetcher::default()
    });
    let store = Arc::new(MemoryStore::default());
    let tracker = Arc::new(ProgressTracker::new());

    let summary = orchestrator(source, fetcher, store.clone(), tracker.clone())
        .run(true)
        .await
        .unwrap();

    assert_eq!(summary.networks, 4);
    assert_eq!(summary.failed_networks, 0);
    // Chains 1 and 56 gain their wrapped-native token; 999 is unregistered.
    assert_eq!(summary.tokens_processed, 1201 + 701 + 40);
    assert_eq!(summary.errors, 2);
    assert_eq!(store.count(), 1201 + 1 + 40);

    let all = tracker.snapshot(ALL_NETWORKS_KEY).unwrap();
    assert_eq!((all.total, all.processed), (4, 4));
    assert!(all.is_complete());

    assert_eq!(tracker.snapshot(&network_key(56)).unwrap().errors, 2);
    assert!(tracker.snapshot(&network_key(10)).is_none());
    assert_eq!(tracker.get_stats().errors, 2);
}

#[tokio::test]
async fn test_discovery_failure_fails_pass() {
    let source = Arc::new(StaticSource::failing());
    let fetcher = Arc::new(MockFetcher::default());
    let tracker = Arc::new(ProgressTracker::new());

    let result = orchestrator(
        source.clone(),
        fetcher.clone(),
        Arc::new(MemoryStore::default()),
        tracker.clone(),
    )
    .run(false)
    .await;

    assert!(result.is_err());
    assert_eq!(source.calls(), vec![false]);
    assert!(fetcher.batch_sizes().is_empty());
    assert!(tracker.snapshot(ALL_NETWORKS_KEY).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_previous_pass_counts_do_not_leak() {
    let networks: NetworkTokenSet = [(999, tokens(999, 5))].into_iter().collect();
    let source = Arc::new(StaticSource::new(networks));
    let fetcher = Arc::new(MockFetcher {
        failing_chains: [999].into_iter().collect(),
        ..MockFetcher::default()
    });
    let tracker = Arc::new(ProgressTracker::new());
    let orchestrator = orchestrator(
        source,
        fetcher,
        Arc::new(MemoryStore::default()),
        tracker.clone(),
    );

    orchestrator.run(true).await.unwrap();
    orchestrator.run(false).await.unwrap();

    let stats = tracker.get_stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.tracked, 2);
}
