use crate::model::BlockRange;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single ledger call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Phase of a scan, carried by fatal errors so the caller can tell where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Init,
    Partitioning,
    LogFetch,
    AddressAggregation,
    Enrichment,
    Done,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanPhase::Init => "init",
            ScanPhase::Partitioning => "partitioning",
            ScanPhase::LogFetch => "log fetch",
            ScanPhase::AddressAggregation => "address aggregation",
            ScanPhase::Enrichment => "enrichment",
            ScanPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that abort a scan. Per-address enrichment failures never show up here.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid block range {from}-{to} with chunk size {chunk_size}")]
    InvalidRange { from: u64, to: u64, chunk_size: u64 },

    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to resolve latest block height: {0}")]
    ChainHeight(#[source] RpcError),

    #[error("failed to fetch logs for blocks {range}: {source}")]
    LogFetch {
        range: BlockRange,
        #[source]
        source: RpcError,
    },

    #[error("aggregator stopped before the log fetch phase completed")]
    Aggregator,

    #[error("scan cancelled during {phase} phase")]
    Cancelled { phase: ScanPhase },

    #[error("failed to write results to {}: {source}", .path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Phase in which the error was raised.
    pub fn phase(&self) -> ScanPhase {
        match self {
            ScanError::InvalidRange { .. } => ScanPhase::Partitioning,
            ScanError::InvalidConfig(_) | ScanError::ChainHeight(_) => ScanPhase::Init,
            ScanError::LogFetch { .. } => ScanPhase::LogFetch,
            ScanError::Aggregator => ScanPhase::AddressAggregation,
            ScanError::Cancelled { phase } => *phase,
            ScanError::Serialization { .. } => ScanPhase::Done,
        }
    }
}
