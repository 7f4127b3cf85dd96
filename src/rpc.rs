use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use alloy_primitives::{Address, Bytes};
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

type AlloyFullProvider = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider,
>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// JSON-RPC access to one network over one or more endpoints. Failed or slow
/// requests rotate to the next endpoint and are retried with backoff.
#[derive(Clone)]
pub struct RpcClient {
    chain_id: u64,
    providers: Vec<AlloyFullProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    max_retries: usize,
}

impl RpcClient {
    pub fn new(chain_id: u64, rpc_urls: &[String]) -> Result<Self> {
        if rpc_urls.is_empty() {
            return Err(anyhow::anyhow!(
                "At least one RPC URL must be provided for chain {}",
                chain_id
            ));
        }

        let mut providers = Vec::new();
        for url in rpc_urls {
            let parsed_url = url
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", url))?;
            let provider: AlloyFullProvider = ProviderBuilder::new().connect_http(parsed_url);
            providers.push(provider);
        }

        Ok(RpcClient {
            chain_id,
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            max_retries: 3,
        })
    }

    fn get_provider(&self) -> &AlloyFullProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[index]
    }

    pub fn get_current_url(&self) -> &str {
        let index = self.current_provider.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    pub fn rotate_provider(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);

        if self.providers.len() > 1 {
            debug!("Chain {}: rotating to RPC provider #{}", self.chain_id, next);
        }
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.max_retries)
    }

    fn handle_error(&self, error_str: &str) {
        warn!(
            "Chain {}: RPC error on {}: {}, rotating provider",
            self.chain_id,
            self.get_current_url(),
            error_str
        );
        self.rotate_provider();
    }

    fn handle_timeout(&self) -> anyhow::Error {
        warn!(
            "Chain {}: request timeout after {} seconds on {}, rotating provider",
            self.chain_id,
            REQUEST_TIMEOUT.as_secs(),
            self.get_current_url()
        );
        self.rotate_provider();
        anyhow::anyhow!(
            "Request timeout after {} seconds",
            REQUEST_TIMEOUT.as_secs()
        )
    }

    /// `eth_call` against `to` at the latest block, decoding the return data.
    ///
    /// Reverts are not retried: they are answers, not transport failures.
    pub async fn call_contract<C>(&self, to: Address, call: C) -> Result<C::Return>
    where
        C: SolCall + Send + Sync + 'static,
    {
        let input = Bytes::from(call.abi_encode());
        let client = self.clone();
        let output = Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            let tx = TransactionRequest::default().to(to).input(input.clone().into());
            async move {
                let provider = client.get_provider();
                match timeout(REQUEST_TIMEOUT, provider.call(tx)).await {
                    Ok(Ok(output)) => Ok(Ok(output)),
                    Ok(Err(e)) => {
                        let error_str = e.to_string();
                        if error_str.contains("revert") {
                            // hack: surface reverts through Ok so Retry stops here
                            Ok(Err(anyhow::anyhow!("{}", e)))
                        } else {
                            client.handle_error(&error_str);
                            Err(anyhow::anyhow!("{}", e))
                        }
                    }
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
        .and_then(|r| r)?;

        Ok(C::abi_decode_returns(&output)?)
    }
}
