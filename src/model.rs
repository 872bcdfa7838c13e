use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Inclusive block range. Always satisfies `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedRange")]
pub struct BlockRange {
    from: u64,
    to: u64,
}

#[derive(Deserialize)]
struct UncheckedRange {
    from: u64,
    to: u64,
}

impl TryFrom<UncheckedRange> for BlockRange {
    type Error = String;

    fn try_from(range: UncheckedRange) -> Result<Self, Self::Error> {
        BlockRange::new(range.from, range.to)
            .ok_or_else(|| format!("block range {}-{} ends before it starts", range.from, range.to))
    }
}

impl BlockRange {
    /// Returns `None` when `from > to`.
    pub fn new(from: u64, to: u64) -> Option<Self> {
        (from <= to).then_some(BlockRange { from, to })
    }

    pub fn from(&self) -> u64 {
        self.from
    }

    pub fn to(&self) -> u64 {
        self.to
    }

    /// Number of blocks covered by the range.
    pub fn block_count(&self) -> u64 {
        (self.to - self.from).saturating_add(1)
    }

    pub fn contains(&self, block: u64) -> bool {
        self.from <= block && block <= self.to
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub block_number: u64,
    pub tx_hash: B256,
    pub token_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

impl TransferRecord {
    fn sort_key(&self) -> (u64, Option<u64>, B256) {
        (self.block_number, self.log_index, self.tx_hash)
    }
}

/// Capability hint derived from bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hint {
    #[serde(rename = "EOA")]
    Eoa,
    #[serde(rename = "name()")]
    Name,
    #[serde(rename = "symbol()")]
    Symbol,
    #[serde(rename = "decimals()")]
    Decimals,
}

impl Hint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hint::Eoa => "EOA",
            Hint::Name => "name()",
            Hint::Symbol => "symbol()",
            Hint::Decimals => "decimals()",
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort token metadata. Each field is resolved independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    #[serde(default)]
    pub hints: Vec<Hint>,
}

impl ContractInfo {
    /// Merges resolved metadata into this entry. Present fields are never cleared,
    /// and hints are left untouched.
    pub fn merge_metadata(&mut self, metadata: TokenMetadata) {
        if metadata.name.is_some() {
            self.name = metadata.name;
        }
        if metadata.symbol.is_some() {
            self.symbol = metadata.symbol;
        }
        if metadata.decimals.is_some() {
            self.decimals = metadata.decimals;
        }
    }

    pub fn merge_hints(&mut self, hints: Vec<Hint>) {
        for hint in hints {
            if !self.hints.contains(&hint) {
                self.hints.push(hint);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub transfers: Vec<TransferRecord>,
    pub contracts: BTreeMap<Address, ContractInfo>,
    /// Chunks dropped under the skip policy. Empty unless skipping was enabled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_ranges: Vec<BlockRange>,
}

impl ScanResult {
    /// Orders transfers by block number, then log index, then transaction hash.
    pub fn sort_transfers(&mut self) {
        self.transfers.sort_by_key(TransferRecord::sort_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn block_range_rejects_inverted_bounds() {
        assert!(BlockRange::new(10, 9).is_none());
        let range = BlockRange::new(7, 7).unwrap();
        assert_eq!(range.block_count(), 1);
        assert_eq!(range.to_string(), "7-7");
    }

    #[test]
    fn deserializing_a_range_checks_bounds() {
        let range: BlockRange = serde_json::from_str(r#"{"from":3,"to":8}"#).unwrap();
        assert_eq!(range, BlockRange::new(3, 8).unwrap());

        let inverted = serde_json::from_str::<BlockRange>(r#"{"from":8,"to":3}"#);
        assert!(inverted.is_err());
    }

    #[test]
    fn merge_keeps_hints_and_present_fields() {
        let mut info = ContractInfo {
            name: Some("Token".to_string()),
            hints: vec![Hint::Name, Hint::Decimals],
            ..Default::default()
        };

        info.merge_metadata(TokenMetadata {
            name: None,
            symbol: Some("TKN".to_string()),
            decimals: Some(18),
        });

        assert_eq!(info.name.as_deref(), Some("Token"));
        assert_eq!(info.symbol.as_deref(), Some("TKN"));
        assert_eq!(info.decimals, Some(18));
        assert_eq!(info.hints, vec![Hint::Name, Hint::Decimals]);
    }

    #[test]
    fn serializes_absent_metadata_as_null() {
        let mut result = ScanResult::default();
        let token = address!("00000000000000000000000000000000000000aa");
        result.contracts.insert(
            token,
            ContractInfo {
                hints: vec![Hint::Eoa],
                ..Default::default()
            },
        );

        let json = serde_json::to_value(&result).unwrap();
        let entry = &json["contracts"]["0x00000000000000000000000000000000000000aa"];
        assert!(entry["name"].is_null());
        assert!(entry["decimals"].is_null());
        assert_eq!(entry["hints"], serde_json::json!(["EOA"]));
        assert!(json.get("skippedRanges").is_none());
    }

    #[test]
    fn sorts_transfers_by_block_then_log_index() {
        let token = Address::ZERO;
        let record = |block_number, log_index| TransferRecord {
            block_number,
            tx_hash: B256::ZERO,
            token_address: token,
            log_index: Some(log_index),
        };
        let mut result = ScanResult {
            transfers: vec![record(5, 1), record(3, 2), record(5, 0)],
            ..Default::default()
        };

        result.sort_transfers();

        let order: Vec<_> = result
            .transfers
            .iter()
            .map(|t| (t.block_number, t.log_index))
            .collect();
        assert_eq!(order, vec![(3, Some(2)), (5, Some(0)), (5, Some(1))]);
    }
}
