use alloy::sol;
use alloy::sol_types::SolEvent;
use alloy_primitives::B256;

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);

    function name() external view returns (string);
    function symbol() external view returns (string);
    function decimals() external view returns (uint8);
}

pub mod erc721 {
    alloy::sol! {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }
}

pub const ERC20_TRANSFER_TOPIC: B256 = Transfer::SIGNATURE_HASH;
pub const ERC721_TRANSFER_TOPIC: B256 = erc721::Transfer::SIGNATURE_HASH;

/// Topic filter for transfer logs. Indexed parameters are not part of the
/// signature, so both standards collapse to a single hash.
pub fn transfer_topics() -> Vec<B256> {
    let mut topics = vec![ERC20_TRANSFER_TOPIC, ERC721_TRANSFER_TOPIC];
    topics.dedup();
    topics
}
