use crate::error::RpcError;
use crate::model::BlockRange;
use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;

/// Log entry as returned by the ledger. Pending logs may lack their block and
/// transaction coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

/// Read-only view of an EVM ledger consumed by the scanner.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current chain height.
    async fn current_height(&self) -> Result<u64, RpcError>;

    /// Logs in `range` whose first topic is any of `topics`.
    async fn get_logs(&self, range: BlockRange, topics: &[B256]) -> Result<Vec<RawLog>, RpcError>;

    /// Deployed bytecode at `address`; empty for externally-owned accounts.
    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError>;

    /// Read-only `eth_call` against `address` at the latest block.
    async fn call(&self, address: Address, calldata: Bytes) -> Result<Bytes, RpcError>;
}
