use crate::error::RpcError;
use crate::events::{decimalsCall, nameCall, symbolCall};
use crate::ledger::Ledger;
use crate::model::TokenMetadata;
use alloy::sol_types::SolCall;
use alloy_primitives::Address;
use tracing::debug;

/// Issues one read-only call and decodes its return value.
async fn read_field<L, C>(ledger: &L, address: Address, call: C) -> Result<C::Return, RpcError>
where
    L: Ledger + ?Sized,
    C: SolCall,
{
    let output = ledger.call(address, call.abi_encode().into()).await?;
    C::abi_decode_returns(&output).map_err(|e| RpcError::Decode(e.to_string()))
}

fn settle<T>(address: Address, field: &str, result: Result<T, RpcError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("{}() unavailable on {:?}: {}", field, address, e);
            None
        }
    }
}

/// Reads `name()`, `symbol()` and `decimals()` independently. A failed read
/// leaves only its own field empty; this never fails as a whole.
pub async fn fetch_token_metadata<L>(ledger: &L, address: Address) -> TokenMetadata
where
    L: Ledger + ?Sized,
{
    let (name, symbol, decimals) = tokio::join!(
        read_field(ledger, address, nameCall {}),
        read_field(ledger, address, symbolCall {}),
        read_field(ledger, address, decimalsCall {}),
    );

    let metadata = TokenMetadata {
        name: settle(address, "name", name),
        symbol: settle(address, "symbol", symbol),
        decimals: settle(address, "decimals", decimals),
    };
    debug!("Resolved metadata for {:?}: {:?}", address, metadata);
    metadata
}
