use anyhow::Result;
use std::sync::Arc;
use token_price_indexer::config::{Config, NetworksConfig};
use token_price_indexer::discovery::TokenListSource;
use token_price_indexer::governor::BatchGovernor;
use token_price_indexer::orchestrator::RefreshOrchestrator;
use token_price_indexer::pricing::OnchainPriceFetcher;
use token_price_indexer::progress::ProgressTracker;
use token_price_indexer::repository::Database;
use token_price_indexer::scheduler::Scheduler;
use token_price_indexer::store::SqlitePriceStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting token price indexer");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!(
        "Batch size {}, {} batches per group, {:?} between groups",
        config.batch.batch_size, config.batch.group_size, config.batch.group_delay
    );

    let networks = NetworksConfig::load(&config.networks_path)?;
    info!("{} network(s) configured", networks.networks.len());
    let registry = Arc::new(networks.native_registry());

    let db = Database::new(&config.database_url)?;
    info!("Database initialized");

    let fetcher = OnchainPriceFetcher::new(&networks.networks, &registry, config.fetch_concurrency)?;
    info!("RPC clients ready");

    let source = TokenListSource::new(&config.token_list_path, db.clone())
        .with_chains(networks.chain_ids());

    let tracker = ProgressTracker::global();
    let governor = Arc::new(BatchGovernor::new(
        Arc::new(fetcher),
        Arc::new(SqlitePriceStore::new(db)),
        registry.clone(),
        tracker.clone(),
        config.batch,
    ));
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Arc::new(source),
        governor,
        registry,
        tracker,
    ));

    let scheduler = Scheduler::new(orchestrator, config.refresh_interval, config.rediscovery_window);
    scheduler.start();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    scheduler.stop();

    Ok(())
}
