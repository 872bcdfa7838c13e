use crate::error::RpcError;
use crate::ledger::{Ledger, RawLog};
use crate::model::{BlockRange, TransferRecord};
use alloy_primitives::B256;
use tracing::{debug, warn};

/// Fetches transfer logs for a single chunk. Errors are returned to the caller untouched.
pub async fn fetch_logs<L>(
    ledger: &L,
    range: BlockRange,
    topics: &[B256],
) -> Result<Vec<RawLog>, RpcError>
where
    L: Ledger + ?Sized,
{
    let logs = ledger.get_logs(range, topics).await?;
    debug!("Received {} logs for blocks {}", logs.len(), range);
    Ok(logs)
}

/// Converts raw logs into transfer records, dropping pending logs that have no
/// block number or transaction hash yet.
pub fn to_transfer_records(logs: &[RawLog]) -> Vec<TransferRecord> {
    logs.iter()
        .filter_map(|log| match (log.block_number, log.transaction_hash) {
            (Some(block_number), Some(tx_hash)) => Some(TransferRecord {
                block_number,
                tx_hash,
                token_address: log.address,
                log_index: log.log_index,
            }),
            _ => {
                warn!("Skipping pending log from {:?}", log.address);
                None
            }
        })
        .collect()
}
