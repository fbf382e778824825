use super::{ChainControl, Signer, TxOutcome};
use crate::config::chains::ChainConfig;
use crate::error::ChainError;
use crate::fork_db::ForkDB;
use crate::utils::constants::LOCAL_TX_GAS_LIMIT;
use crate::utils::error::describe_revert;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use revm::db::{AccountState, CacheDB, EmptyDB};
use revm::primitives::{AccountInfo, Bytecode, ExecutionResult, Output, TxKind};
use revm::{Database, DatabaseRef, Evm};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// In-process chain on revm. Writes land in the `CacheDB` overlay; reads fall
/// through to `DB` (a remote fork or an empty state).
pub struct LocalChain<DB: DatabaseRef> {
    db: CacheDB<DB>,
    chain: ChainConfig,
    block_number: u64,
    timestamp: u64,
    impersonated: HashSet<Address>,
}

impl LocalChain<EmptyDB> {
    /// Blank chain starting at block 1 with the wall-clock timestamp.
    pub fn empty(chain: ChainConfig) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::new(EmptyDB::default(), chain, 1, now)
    }
}

impl LocalChain<ForkDB> {
    /// Fork `rpc_url` at `block_number` (or its head); local blocks continue
    /// from the fork point.
    pub fn fork(
        rpc_url: &str,
        block_number: Option<u64>,
        chain: ChainConfig,
    ) -> anyhow::Result<Self> {
        let db = ForkDB::new(rpc_url, block_number)?;
        let head = db.head();
        let block_time = chain.block_time_secs();
        Ok(Self::new(
            db,
            chain,
            head.number.saturating_add(1),
            head.timestamp.saturating_add(block_time),
        ))
    }
}

impl<DB> LocalChain<DB>
where
    DB: DatabaseRef,
    DB::Error: std::fmt::Debug,
{
    pub fn new(db: DB, chain: ChainConfig, block_number: u64, timestamp: u64) -> Self {
        Self {
            db: CacheDB::new(db),
            chain,
            block_number,
            timestamp,
            impersonated: HashSet::new(),
        }
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_impersonated(&self, who: Address) -> bool {
        self.impersonated.contains(&who)
    }

    fn db_error(context: &str, err: DB::Error) -> ChainError {
        ChainError::Database(format!("{context}: {err:?}"))
    }

    fn ensure_unlocked(&self, signer: &Signer) -> Result<(), ChainError> {
        if self.impersonated.contains(&signer.address()) {
            Ok(())
        } else {
            Err(ChainError::NotImpersonated(signer.address()))
        }
    }

    fn account_info(&mut self, who: Address) -> Result<AccountInfo, ChainError> {
        Ok(self
            .db
            .basic(who)
            .map_err(|err| Self::db_error("basic", err))?
            .unwrap_or_default())
    }

    /// `insert_account_info` keeps a cached "not existing" marker, which would
    /// hide the new info from `basic`; clear it.
    fn put_account(&mut self, who: Address, info: AccountInfo) {
        self.db.insert_account_info(who, info);
        if let Some(account) = self.db.accounts.get_mut(&who) {
            if matches!(account.account_state, AccountState::NotExisting) {
                account.account_state = AccountState::None;
            }
        }
    }

    fn execute(
        &mut self,
        caller: Address,
        kind: TxKind,
        data: Bytes,
        commit: bool,
    ) -> Result<ExecutionResult, ChainError> {
        let chain_id = self.chain.chain_id;
        let number = self.block_number;
        let timestamp = self.timestamp;

        let mut evm = Evm::builder()
            .with_db(&mut self.db)
            .modify_cfg_env(|cfg| {
                cfg.chain_id = chain_id;
                // Impersonated contract accounts must be able to send, as on Hardhat/Anvil.
                cfg.disable_eip3607 = true;
            })
            .modify_block_env(|block| {
                block.number = U256::from(number);
                block.timestamp = U256::from(timestamp);
                block.gas_limit = U256::from(LOCAL_TX_GAS_LIMIT);
                block.basefee = U256::ZERO;
            })
            .modify_tx_env(|tx| {
                tx.caller = caller;
                tx.transact_to = kind;
                tx.data = data;
                tx.value = U256::ZERO;
                tx.gas_limit = LOCAL_TX_GAS_LIMIT;
                tx.gas_price = U256::ZERO;
                tx.gas_priority_fee = None;
                tx.nonce = None;
            })
            .build();

        let result = if commit {
            evm.transact_commit()
        } else {
            evm.transact().map(|outcome| outcome.result)
        };
        result.map_err(|err| ChainError::Database(format!("revm transact error: {err:?}")))
    }

    fn settle(result: ExecutionResult, context: String) -> Result<TxOutcome, ChainError> {
        match result {
            ExecutionResult::Success {
                gas_used, output, ..
            } => {
                let (output, contract_address) = match output {
                    Output::Call(bytes) => (bytes, None),
                    Output::Create(bytes, address) => (bytes, address),
                };
                Ok(TxOutcome {
                    gas_used,
                    output,
                    contract_address,
                })
            }
            ExecutionResult::Revert { output, .. } => Err(ChainError::Reverted {
                context,
                reason: describe_revert(&output),
            }),
            ExecutionResult::Halt { reason, .. } => Err(ChainError::Halted {
                context,
                reason: format!("{reason:?}"),
            }),
        }
    }

    fn advance_block(&mut self) {
        self.block_number = self.block_number.saturating_add(1);
        self.timestamp = self.timestamp.saturating_add(self.chain.block_time_secs());
    }
}

#[async_trait]
impl<DB> ChainControl for LocalChain<DB>
where
    DB: DatabaseRef + Send,
    DB::Error: std::fmt::Debug + Send,
{
    async fn impersonate_account(&mut self, who: Address) -> Result<Signer, ChainError> {
        if self.impersonated.insert(who) {
            tracing::debug!("[CHAIN] Impersonating {}", who);
        }
        Ok(Signer::impersonated(who))
    }

    async fn stop_impersonating_account(&mut self, who: Address) -> Result<(), ChainError> {
        self.impersonated.remove(&who);
        Ok(())
    }

    async fn set_balance(&mut self, who: Address, amount: U256) -> Result<(), ChainError> {
        let mut info = self.account_info(who)?;
        info.balance = amount;
        self.put_account(who, info);
        Ok(())
    }

    async fn balance(&mut self, who: Address) -> Result<U256, ChainError> {
        Ok(self.account_info(who)?.balance)
    }

    async fn set_storage_at(
        &mut self,
        contract: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), ChainError> {
        self.db
            .insert_account_storage(contract, slot, value)
            .map_err(|err| Self::db_error("insert_account_storage", err))
    }

    async fn storage_at(&mut self, contract: Address, slot: U256) -> Result<U256, ChainError> {
        self.db
            .storage(contract, slot)
            .map_err(|err| Self::db_error("storage", err))
    }

    async fn set_code(&mut self, who: Address, runtime_code: Bytes) -> Result<(), ChainError> {
        let mut info = self.account_info(who)?;
        let bytecode = Bytecode::new_raw(runtime_code);
        info.code_hash = bytecode.hash_slow();
        info.code = Some(bytecode);
        self.put_account(who, info);
        Ok(())
    }

    async fn mine(&mut self) -> Result<(), ChainError> {
        self.advance_block();
        Ok(())
    }

    async fn deploy(&mut self, from: &Signer, init_code: Bytes) -> Result<Address, ChainError> {
        self.ensure_unlocked(from)?;
        let result = self.execute(from.address(), TxKind::Create, init_code, true)?;
        let outcome = Self::settle(result, format!("deployment from {from}"))?;
        self.advance_block();
        outcome.contract_address.ok_or_else(|| {
            ChainError::Decode("deployment result without a contract address".to_string())
        })
    }

    async fn send(
        &mut self,
        from: &Signer,
        to: Address,
        data: Bytes,
    ) -> Result<TxOutcome, ChainError> {
        self.ensure_unlocked(from)?;
        let result = self.execute(from.address(), TxKind::Call(to), data, true)?;
        // A reverted transaction is still mined.
        self.advance_block();
        Self::settle(result, format!("call to {to} from {from}"))
    }

    async fn call(&mut self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let result = self.execute(Address::ZERO, TxKind::Call(to), data, false)?;
        Self::settle(result, format!("eth_call to {to}")).map(|outcome| outcome.output)
    }
}

#[cfg(test)]
mod tests {
    use super::LocalChain;
    use crate::chain::{ChainControl, Signer};
    use crate::config::chains::ChainConfig;
    use crate::error::ChainError;
    use alloy::primitives::{Address, Bytes, U256};

    // PUSH1 0x2a PUSH1 0x00 MSTORE PUSH1 0x20 PUSH1 0x00 RETURN
    const RETURN_42: [u8; 10] = [0x60, 0x2a, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3];
    // PUSH1 0x00 DUP1 REVERT
    const ALWAYS_REVERT: [u8; 4] = [0x60, 0x00, 0x80, 0xfd];

    fn init_code(runtime: &[u8]) -> Bytes {
        let mut code = vec![
            0x60,
            runtime.len() as u8,
            0x80,
            0x60,
            0x0b,
            0x60,
            0x00,
            0x39,
            0x60,
            0x00,
            0xf3,
        ];
        code.extend_from_slice(runtime);
        Bytes::from(code)
    }

    #[tokio::test]
    async fn test_send_requires_impersonation() {
        let mut chain = LocalChain::empty(ChainConfig::avalanche());
        let stranger = Signer::impersonated(Address::from([0x42; 20]));
        let err = chain
            .send(&stranger, Address::from([0x55; 20]), Bytes::new())
            .await
            .expect_err("unlocked accounts only");
        assert!(matches!(err, ChainError::NotImpersonated(addr) if addr == stranger.address()));

        let signer = chain
            .impersonate_account(stranger.address())
            .await
            .expect("impersonate");
        chain
            .send(&signer, Address::from([0x55; 20]), Bytes::new())
            .await
            .expect("plain transfer to empty account succeeds");

        chain
            .stop_impersonating_account(signer.address())
            .await
            .expect("stop");
        assert!(!chain.is_impersonated(signer.address()));
    }

    #[tokio::test]
    async fn test_set_balance_round_trip() {
        let mut chain = LocalChain::empty(ChainConfig::avalanche());
        let who = Address::from([0x11; 20]);
        assert_eq!(chain.balance(who).await.expect("balance"), U256::ZERO);
        chain
            .set_balance(who, U256::from(123u64))
            .await
            .expect("set");
        assert_eq!(chain.balance(who).await.expect("balance"), U256::from(123u64));
    }

    #[tokio::test]
    async fn test_deploy_then_call_returns_runtime_output() {
        let mut chain = LocalChain::empty(ChainConfig::avalanche());
        let deployer = chain
            .impersonate_account(Address::from([0xde; 20]))
            .await
            .expect("impersonate");
        let start_block = chain.block_number();
        let deployed = chain
            .deploy(&deployer, init_code(&RETURN_42))
            .await
            .expect("deploy");
        assert_eq!(chain.block_number(), start_block + 1);

        let out = chain.call(deployed, Bytes::new()).await.expect("call");
        assert_eq!(U256::from_be_slice(&out), U256::from(42u64));
    }

    #[tokio::test]
    async fn test_reverting_send_surfaces_reverted_error() {
        let mut chain = LocalChain::empty(ChainConfig::avalanche());
        let target = Address::from([0x77; 20]);
        chain
            .set_code(target, Bytes::from(ALWAYS_REVERT.to_vec()))
            .await
            .expect("set code");
        let signer = chain
            .impersonate_account(Address::from([0x33; 20]))
            .await
            .expect("impersonate");
        let err = chain
            .send(&signer, target, Bytes::new())
            .await
            .expect_err("must revert");
        assert!(matches!(err, ChainError::Reverted { ref reason, .. } if reason == "revert: <empty>"));
    }

    #[tokio::test]
    async fn test_storage_overwrite_is_visible() {
        let mut chain = LocalChain::empty(ChainConfig::avalanche());
        let token = Address::from([0x99; 20]);
        chain
            .set_storage_at(token, U256::from(5u64), U256::from(77u64))
            .await
            .expect("write");
        assert_eq!(
            chain
                .storage_at(token, U256::from(5u64))
                .await
                .expect("read"),
            U256::from(77u64)
        );
    }

    #[tokio::test]
    async fn test_mine_advances_block_and_time() {
        let mut chain = LocalChain::empty(ChainConfig::avalanche());
        let (n, t) = (chain.block_number(), chain.timestamp());
        chain.mine().await.expect("mine");
        assert_eq!(chain.block_number(), n + 1);
        assert_eq!(chain.timestamp(), t + 2);
    }
}
