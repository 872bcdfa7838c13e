use crate::events::{decimalsCall, nameCall, symbolCall};
use crate::model::Hint;
use alloy::sol_types::SolCall;
use alloy_primitives::hex;

/// Selector table, in output order.
const SELECTORS: [([u8; 4], Hint); 3] = [
    (nameCall::SELECTOR, Hint::Name),
    (symbolCall::SELECTOR, Hint::Symbol),
    (decimalsCall::SELECTOR, Hint::Decimals),
];

/// Derives capability hints from raw bytecode. Empty code means an EOA.
///
/// Matching is a plain substring search over the hex encoding, so selector
/// bytes that happen to appear in constants or unrelated code also match.
pub fn classify(bytecode: &[u8]) -> Vec<Hint> {
    if bytecode.is_empty() {
        return vec![Hint::Eoa];
    }
    scan_hex(&hex::encode(bytecode))
}

/// Same as [`classify`] for a hex string, with or without `0x`, in any case.
pub fn classify_hex(bytecode: &str) -> Vec<Hint> {
    let trimmed = bytecode
        .strip_prefix("0x")
        .or_else(|| bytecode.strip_prefix("0X"))
        .unwrap_or(bytecode);
    if trimmed.is_empty() {
        return vec![Hint::Eoa];
    }
    scan_hex(&trimmed.to_ascii_lowercase())
}

fn scan_hex(code: &str) -> Vec<Hint> {
    SELECTORS
        .iter()
        .filter(|(selector, _)| code.contains(&hex::encode(selector)))
        .map(|(_, hint)| *hint)
        .collect()
}
