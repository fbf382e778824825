use super::signers::RoleSigners;
use crate::chain::{ChainControl, Signer};
use crate::contracts::{approved_contract, Erc20Handle};
use crate::error::ChainError;
use alloy::primitives::{Address, U256};

/// Everything `before` produced, handed to each case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyFixture {
    pub wallet: Signer,
    pub roles: RoleSigners,
    pub deposit_token: Erc20Handle,
    pub strategy: Address,
    pub orchestrator: Address,
    /// Sender of `deposit`/`withdraw`.
    pub strategy_caller: Signer,
    /// Account whose pool-token balance the cases compare.
    pub balance_holder: Address,
}

impl StrategyFixture {
    /// `approvedContracts(strategy)` as currently recorded by the orchestrator.
    pub async fn approval_status<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
    ) -> Result<bool, ChainError> {
        approved_contract(chain, self.orchestrator, self.strategy).await
    }

    pub async fn holder_balance<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
    ) -> Result<U256, ChainError> {
        self.deposit_token
            .balance_of(chain, self.balance_holder)
            .await
    }
}
