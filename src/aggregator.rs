use crate::model::{BlockRange, ScanResult, TransferRecord};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct ChunkBatch {
    pub range: BlockRange,
    pub transfers: Vec<TransferRecord>,
}

pub enum AggregatorMessage {
    Chunk(ChunkBatch),
    /// A chunk dropped under the skip policy.
    Skipped(BlockRange),
}

/// Sole owner of the in-progress result during the log fetch phase. Runs until
/// every sender is dropped, then hands the result back.
pub async fn run_aggregator(mut rx: mpsc::Receiver<AggregatorMessage>) -> ScanResult {
    let mut result = ScanResult::default();
    while let Some(message) = rx.recv().await {
        match message {
            AggregatorMessage::Chunk(batch) => process_batch(&mut result, batch),
            AggregatorMessage::Skipped(range) => result.skipped_ranges.push(range),
        }
    }
    result
}

fn process_batch(result: &mut ScanResult, batch: ChunkBatch) {
    let start = Instant::now();
    let count = batch.transfers.len();

    for transfer in &batch.transfers {
        // first sighting wins, later ones leave the entry alone
        result.contracts.entry(transfer.token_address).or_default();
    }
    result.transfers.extend(batch.transfers);

    debug!("Aggregated {} transfers in {:?}", count, start.elapsed());
    info!(
        "Processed {} ({} transfers, {} contracts known)",
        batch.range,
        count,
        result.contracts.len()
    );
}
