use crate::aggregator::{AggregatorMessage, ChunkBatch, run_aggregator};
use crate::classifier::classify;
use crate::config::{BlockTarget, ChunkFailurePolicy, ScanConfig};
use crate::error::{RpcError, ScanError, ScanPhase};
use crate::events::transfer_topics;
use crate::fetcher::{fetch_logs, to_transfer_records};
use crate::ledger::{Ledger, RawLog};
use crate::metadata::fetch_token_metadata;
use crate::model::{BlockRange, ContractInfo, Hint, ScanResult, TokenMetadata};
use crate::partition::partition;
use alloy_primitives::{Address, B256};
use futures::{StreamExt, stream};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_retry::Retry;
use tokio_retry::strategy::jitter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Un-jittered delays between chunk attempts: `base`, `2 * base`, `4 * base`, ...
/// capped at thirty seconds.
pub fn chunk_backoff(base: Duration, retries: usize) -> impl Iterator<Item = Duration> + Send {
    let base = base.max(Duration::from_millis(1));
    (0..retries).map(move |attempt| {
        let factor = 2u32.saturating_pow(attempt.min(u32::MAX as usize) as u32);
        base.saturating_mul(factor).min(MAX_RETRY_DELAY)
    })
}

/// Outcome of enriching one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub address: Address,
    /// Empty when the bytecode could not be fetched.
    pub hints: Vec<Hint>,
    /// Only resolved for addresses with code.
    pub metadata: Option<TokenMetadata>,
}

/// Fetches bytecode, classifies it and, for contracts, resolves token metadata.
/// Never fails: an unreachable address simply yields no hints.
pub async fn enrich_address<L>(ledger: &L, address: Address) -> Enrichment
where
    L: Ledger + ?Sized,
{
    let code = match ledger.get_code(address).await {
        Ok(code) => code,
        Err(e) => {
            debug!("Could not fetch code for {:?}: {}", address, e);
            return Enrichment {
                address,
                hints: Vec::new(),
                metadata: None,
            };
        }
    };

    let hints = classify(&code);
    let metadata = if code.is_empty() {
        None
    } else {
        Some(fetch_token_metadata(ledger, address).await)
    };

    Enrichment {
        address,
        hints,
        metadata,
    }
}

/// Runs a scan through its phases: init, partitioning, log fetch, address
/// aggregation, enrichment. Each call to [`ScanCoordinator::run`] is independent.
pub struct ScanCoordinator<L: Ledger + ?Sized> {
    ledger: Arc<L>,
    config: ScanConfig,
    topics: Vec<B256>,
    cancel: CancellationToken,
}

impl<L: Ledger + ?Sized> ScanCoordinator<L> {
    pub fn new(ledger: Arc<L>, config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(ScanCoordinator {
            ledger,
            config,
            topics: transfer_topics(),
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the internal cancellation token with one owned by the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub async fn run(&self, from_block: u64, to_block: BlockTarget) -> Result<ScanResult, ScanError> {
        let start = Instant::now();

        self.ensure_active(ScanPhase::Init)?;
        let to_block = self.resolve_end_block(to_block).await?;
        self.ensure_active(ScanPhase::Init)?;

        debug!("Entering {} phase", ScanPhase::Partitioning);
        let ranges = partition(from_block, to_block, self.config.chunk_size)?;
        info!(
            "Scanning blocks {} → {} in {} chunks",
            from_block,
            to_block,
            ranges.len()
        );

        let mut result = self.fetch_phase(ranges).await?;

        debug!("Entering {} phase", ScanPhase::AddressAggregation);
        let addresses: Vec<Address> = result.contracts.keys().copied().collect();
        info!(
            "Collected {} transfers from {} distinct contracts",
            result.transfers.len(),
            addresses.len()
        );

        self.enrichment_phase(addresses, &mut result.contracts).await?;

        result.sort_transfers();
        info!(
            "Scan of blocks {} → {} finished in {:?}",
            from_block,
            to_block,
            start.elapsed()
        );
        Ok(result)
    }

    fn ensure_active(&self, phase: ScanPhase) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            warn!("Scan cancelled during {} phase", phase);
            return Err(ScanError::Cancelled { phase });
        }
        Ok(())
    }

    async fn resolve_end_block(&self, to_block: BlockTarget) -> Result<u64, ScanError> {
        match to_block {
            BlockTarget::Number(block) => Ok(block),
            BlockTarget::Latest => {
                let height = self
                    .ledger
                    .current_height()
                    .await
                    .map_err(ScanError::ChainHeight)?;
                info!("Resolved latest block to {}", height);
                Ok(height)
            }
        }
    }

    /// Fetches one chunk, retrying up to `chunk_retries` times with backoff.
    async fn fetch_chunk(&self, range: BlockRange) -> Result<Vec<RawLog>, RpcError> {
        let ledger = self.ledger.as_ref();
        let topics = self.topics.as_slice();
        let strategy = chunk_backoff(self.config.retry_base_delay, self.config.chunk_retries)
            .map(jitter);
        Retry::spawn(strategy, move || async move {
            let outcome = fetch_logs(ledger, range, topics).await;
            if let Err(e) = &outcome {
                warn!("Fetching logs for blocks {} failed: {}", range, e);
            }
            outcome
        })
        .await
    }

    async fn fetch_phase(&self, ranges: Vec<BlockRange>) -> Result<ScanResult, ScanError> {
        debug!("Entering {} phase", ScanPhase::LogFetch);
        let (tx, rx) = mpsc::channel(self.config.log_fetch_concurrency * 2);
        let aggregator = tokio::spawn(run_aggregator(rx));

        let mut fetches = Box::pin(
            stream::iter(ranges)
                .take_until(self.cancel.cancelled())
                .map(|range| async move { (range, self.fetch_chunk(range).await) })
                .buffer_unordered(self.config.log_fetch_concurrency),
        );

        while let Some((range, outcome)) = fetches.next().await {
            let message = match outcome {
                Ok(logs) => AggregatorMessage::Chunk(ChunkBatch {
                    range,
                    transfers: to_transfer_records(&logs),
                }),
                Err(source) => match self.config.on_chunk_failure {
                    ChunkFailurePolicy::Abort => {
                        aggregator.abort();
                        return Err(ScanError::LogFetch { range, source });
                    }
                    ChunkFailurePolicy::Skip => {
                        warn!("Skipping blocks {} after failed fetch: {}", range, source);
                        AggregatorMessage::Skipped(range)
                    }
                },
            };

            if tx.send(message).await.is_err() {
                return Err(ScanError::Aggregator);
            }
        }

        drop(fetches);
        drop(tx);
        let result = aggregator.await.map_err(|_| ScanError::Aggregator)?;
        self.ensure_active(ScanPhase::LogFetch)?;
        Ok(result)
    }

    async fn enrichment_phase(
        &self,
        addresses: Vec<Address>,
        contracts: &mut BTreeMap<Address, ContractInfo>,
    ) -> Result<(), ScanError> {
        debug!("Entering {} phase", ScanPhase::Enrichment);
        info!(
            "Enriching {} addresses with concurrency {}",
            addresses.len(),
            self.config.enrichment_concurrency
        );

        let ledger = self.ledger.as_ref();
        let mut enrichments = Box::pin(
            stream::iter(addresses)
                .take_until(self.cancel.cancelled())
                .map(|address| enrich_address(ledger, address))
                .buffer_unordered(self.config.enrichment_concurrency),
        );

        while let Some(enrichment) = enrichments.next().await {
            let Some(info) = contracts.get_mut(&enrichment.address) else {
                continue;
            };
            info.merge_hints(enrichment.hints);
            if let Some(metadata) = enrichment.metadata {
                info.merge_metadata(metadata);
            }
        }

        drop(enrichments);
        self.ensure_active(ScanPhase::Enrichment)
    }
}
