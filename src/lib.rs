pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod ledger;
pub mod metadata;
pub mod model;
pub mod output;
pub mod partition;
pub mod rpc;
pub mod scanner;

pub use config::{BlockTarget, ChunkFailurePolicy, Config, ScanConfig};
pub use error::{RpcError, ScanError, ScanPhase};
pub use ledger::{Ledger, RawLog};
pub use model::{BlockRange, ContractInfo, Hint, ScanResult, TokenMetadata, TransferRecord};
pub use rpc::RpcClient;
pub use scanner::ScanCoordinator;
