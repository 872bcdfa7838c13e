use crate::error::RpcError;
use crate::ledger::{Ledger, RawLog};
use crate::model::BlockRange;
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionInput, TransactionRequest};
use alloy::transports::{TransportError, TransportResult};
use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use regex::Regex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

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

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_RETRIES: usize = 5;

/// JSON-RPC ledger client over one or more HTTP endpoints. Failed requests
/// rotate to the next endpoint and are retried with jittered backoff.
#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<AlloyFullProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    request_timeout: Duration,
    max_retries: usize,
}

impl RpcClient {
    pub fn new(rpc_urls: &[String]) -> anyhow::Result<Self> {
        Self::with_limits(rpc_urls, DEFAULT_REQUEST_TIMEOUT, DEFAULT_MAX_RETRIES)
    }

    pub fn with_limits(
        rpc_urls: &[String],
        request_timeout: Duration,
        max_retries: usize,
    ) -> anyhow::Result<Self> {
        if rpc_urls.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC URL must be provided"));
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
            providers,
            urls: rpc_urls.to_vec(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            request_timeout,
            max_retries,
        })
    }

    fn get_provider(&self) -> AlloyFullProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        self.providers[index].clone()
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
            debug!("Rotating to RPC provider #{}", next);
        }
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> + Send + use<> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    fn handle_error(&self, method: &str, error_str: &str) -> RpcError {
        warn!(
            "RPC error in {} on {}: {}, rotating provider",
            method,
            self.get_current_url(),
            error_str
        );
        self.rotate_provider();
        RpcError::Transport(error_str.to_string())
    }

    fn handle_timeout(&self, method: &str) -> RpcError {
        warn!(
            "{} timed out after {} seconds on {}, rotating provider",
            method,
            self.request_timeout.as_secs(),
            self.get_current_url()
        );
        self.rotate_provider();
        RpcError::Timeout(self.request_timeout)
    }

    /// Runs `call` against the current provider with timeout, rotation and retry.
    /// Errors the node reports as final (reverts, result-size limits) are
    /// returned immediately.
    async fn request<T, F, Fut>(&self, method: &'static str, call: F) -> Result<T, RpcError>
    where
        T: Send,
        F: Fn(AlloyFullProvider) -> Fut + Sync,
        Fut: Future<Output = TransportResult<T>> + Send,
    {
        let call = &call;
        Retry::spawn(self.get_retry_strategy(), move || async move {
            match timeout(self.request_timeout, call(self.get_provider())).await {
                Ok(Ok(value)) => Ok(Ok(value)),
                Ok(Err(e)) if is_terminal(&e) => {
                    debug!("{} returned a final error: {}", method, e);
                    Ok(Err(RpcError::Transport(e.to_string())))
                }
                Ok(Err(e)) => Err(self.handle_error(method, &e.to_string())),
                Err(_) => Err(self.handle_timeout(method)),
            }
        })
        .await
        .and_then(|r| r)
    }

    async fn get_logs_internal(
        &self,
        from_block: u64,
        to_block: u64,
        topics: &[B256],
    ) -> Result<Vec<Log>, RpcError> {
        let filter = Filter::new()
            .event_signature(topics.to_vec())
            .from_block(from_block)
            .to_block(to_block);

        self.request("eth_getLogs", |provider| {
            let filter = filter.clone();
            async move { provider.get_logs(&filter).await }
        })
        .await
    }

    fn parse_max_results_error(error_str: &str) -> Option<(u64, u64)> {
        let re = Regex::new(r"retry with the range (\d+)-(\d+)").ok()?;
        let captures = re.captures(error_str)?;

        let from = captures.get(1)?.as_str().parse().ok()?;
        let to = captures.get(2)?.as_str().parse().ok()?;

        Some((from, to))
    }

    /// Fetches logs for `[from_block, to_block]`, following the node's suggested
    /// sub-range whenever the result limit is exceeded.
    async fn get_logs_split(
        &self,
        from_block: u64,
        to_block: u64,
        topics: &[B256],
    ) -> Result<Vec<Log>, RpcError> {
        let mut all_logs = Vec::new();
        let mut current_from = from_block;

        while current_from <= to_block {
            match self.get_logs_internal(current_from, to_block, topics).await {
                Ok(logs) => {
                    all_logs.extend(logs);
                    break;
                }
                Err(RpcError::Transport(error_str)) if error_str.contains("exceeds max results") => {
                    let Some((suggested_from, suggested_to)) =
                        Self::parse_max_results_error(&error_str)
                    else {
                        return Err(RpcError::Transport(error_str));
                    };
                    if suggested_from != current_from
                        || suggested_to < suggested_from
                        || suggested_to > to_block
                    {
                        return Err(RpcError::Transport(error_str));
                    }

                    info!(
                        "Hit max results limit for blocks {}-{}, splitting at block {}",
                        current_from, to_block, suggested_to
                    );

                    let logs = self
                        .get_logs_internal(suggested_from, suggested_to, topics)
                        .await?;
                    all_logs.extend(logs);

                    if suggested_to == to_block {
                        break;
                    }
                    current_from = suggested_to + 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(all_logs)
    }
}

fn is_terminal(error: &TransportError) -> bool {
    let message = error.to_string();
    message.contains("exceeds max results")
        || message.contains("execution reverted")
        || error.as_error_resp().is_some_and(|payload| payload.code == 3)
}

impl From<&Log> for RawLog {
    fn from(log: &Log) -> Self {
        RawLog {
            address: log.address(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        }
    }
}

#[async_trait]
impl Ledger for RpcClient {
    async fn current_height(&self) -> Result<u64, RpcError> {
        self.request("eth_blockNumber", |provider| async move {
            provider.get_block_number().await
        })
        .await
    }

    async fn get_logs(&self, range: BlockRange, topics: &[B256]) -> Result<Vec<RawLog>, RpcError> {
        let logs = self.get_logs_split(range.from(), range.to(), topics).await?;
        Ok(logs.iter().map(RawLog::from).collect())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        self.request("eth_getCode", |provider| async move {
            provider.get_code_at(address).await
        })
        .await
    }

    async fn call(&self, address: Address, calldata: Bytes) -> Result<Bytes, RpcError> {
        self.request("eth_call", |provider| {
            let request = TransactionRequest::default()
                .to(address)
                .input(TransactionInput::new(calldata.clone()));
            async move { provider.call(request).await }
        })
        .await
    }
}
