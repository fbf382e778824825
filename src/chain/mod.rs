//! Test-network control plane.
//!
//! `ChainControl` is the surface the harness drives: account impersonation,
//! balance and storage cheats, contract deployment and calls. Two backends
//! implement it:
//!
//! - [`rpc::RpcChain`] forwards everything to an external Hardhat/Anvil fork
//!   node over JSON-RPC.
//! - [`local::LocalChain`] executes in-process on revm over a `CacheDB`, backed
//!   either by [`crate::fork_db::ForkDB`] (lazy remote fork) or an empty state.

pub mod local;
pub mod rpc;
pub mod storage;

use crate::error::ChainError;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;

pub use local::LocalChain;
pub use rpc::RpcChain;
pub use storage::{mapping_slot, overwrite_token_balance};

/// An address the chain will accept transactions from.
///
/// Signers come out of [`ChainControl::impersonate_account`]. A plain
/// `Address` (a deployed contract, say) must be impersonated first before it
/// can send anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signer {
    address: Address,
}

impl Signer {
    /// Mint a signer handle. Only control-plane backends should call this,
    /// after the account has actually been unlocked.
    pub fn impersonated(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl std::fmt::Display for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub gas_used: u64,
    pub output: Bytes,
    pub contract_address: Option<Address>,
}

#[async_trait]
pub trait ChainControl: Send {
    /// Unlock `who` for sending. Idempotent.
    async fn impersonate_account(&mut self, who: Address) -> Result<Signer, ChainError>;

    async fn stop_impersonating_account(&mut self, who: Address) -> Result<(), ChainError>;

    async fn set_balance(&mut self, who: Address, amount: U256) -> Result<(), ChainError>;

    async fn balance(&mut self, who: Address) -> Result<U256, ChainError>;

    async fn set_storage_at(
        &mut self,
        contract: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), ChainError>;

    async fn storage_at(&mut self, contract: Address, slot: U256) -> Result<U256, ChainError>;

    async fn set_code(&mut self, who: Address, runtime_code: Bytes) -> Result<(), ChainError>;

    async fn mine(&mut self) -> Result<(), ChainError>;

    /// Deploy `init_code` (creation bytecode with constructor args appended).
    async fn deploy(&mut self, from: &Signer, init_code: Bytes) -> Result<Address, ChainError>;

    /// State-changing call. Reverts and halts come back as errors.
    async fn send(
        &mut self,
        from: &Signer,
        to: Address,
        data: Bytes,
    ) -> Result<TxOutcome, ChainError>;

    /// Read-only call; state is not committed.
    async fn call(&mut self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;
}
