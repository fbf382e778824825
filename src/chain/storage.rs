use super::ChainControl;
use crate::error::ChainError;
use alloy::primitives::{keccak256, Address, U256};

/// Storage key of `mapping(address => uint256)` entry `holder` for a mapping
/// declared at `slot`: `keccak256(pad32(holder) ++ pad32(slot))`.
pub fn mapping_slot(holder: Address, slot: U256) -> U256 {
    let mut input = [0u8; 64];
    input[12..32].copy_from_slice(holder.as_slice());
    input[32..64].copy_from_slice(&slot.to_be_bytes::<32>());
    U256::from_be_bytes(keccak256(input).0)
}

/// Force `holder`'s ERC-20 balance on `token` to `amount` by writing the
/// balances mapping directly, then mine a block so the write is visible to
/// subsequent calls on nodes that batch state changes.
pub async fn overwrite_token_balance<C: ChainControl + ?Sized>(
    chain: &mut C,
    token: Address,
    holder: Address,
    amount: U256,
    slot: U256,
) -> Result<(), ChainError> {
    let key = mapping_slot(holder, slot);
    tracing::debug!(
        "[STORAGE] Overwriting balance token={} holder={} slot={} key=0x{:x}",
        token,
        holder,
        slot,
        key
    );
    chain.set_storage_at(token, key, amount).await?;
    chain.mine().await
}
