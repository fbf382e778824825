//! ABI bindings and thin handles for the contracts the harness touches.

pub mod artifacts;

use crate::chain::{ChainControl, Signer};
use crate::error::ChainError;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

pub use artifacts::{ArtifactStore, ContractFactory};

alloy::sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256 balance);
    }

    contract IglooMaster {
        constructor(
            address _pefi,
            uint256 _startTime,
            address _dev,
            address _nest,
            address _nestAllocator,
            address _performanceFeeAddress
        );
        function modifyApprovedContracts(address contractAddress, bool status) external;
        function approvedContracts(address contractAddress) external view returns (bool approved);
    }

    contract StrategyPefiUsdcPgnl {
        constructor(uint256 _pid);
        function deposit(uint256 amount) external;
        function withdraw(uint256 amount) external;
    }
}

/// An ERC-20 bound to the signer that will send on its behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20Handle {
    pub address: Address,
    pub signer: Signer,
}

impl Erc20Handle {
    pub fn new(address: Address, signer: Signer) -> Self {
        Self { address, signer }
    }

    pub async fn balance_of<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
        who: Address,
    ) -> Result<U256, ChainError> {
        let data = IERC20::balanceOfCall { account: who }.abi_encode();
        let raw = chain.call(self.address, Bytes::from(data)).await?;
        <IERC20::balanceOfCall as SolCall>::abi_decode_returns(raw.as_ref(), true)
            .map(|decoded| decoded.balance)
            .map_err(|err| ChainError::Decode(format!("balanceOf({who}) on {}: {err}", self.address)))
    }
}

pub async fn approved_contract<C: ChainControl + ?Sized>(
    chain: &mut C,
    orchestrator: Address,
    contract: Address,
) -> Result<bool, ChainError> {
    let data = IglooMaster::approvedContractsCall {
        contractAddress: contract,
    }
    .abi_encode();
    let raw = chain.call(orchestrator, Bytes::from(data)).await?;
    <IglooMaster::approvedContractsCall as SolCall>::abi_decode_returns(raw.as_ref(), true)
        .map(|decoded| decoded.approved)
        .map_err(|err| ChainError::Decode(format!("approvedContracts({contract}): {err}")))
}
