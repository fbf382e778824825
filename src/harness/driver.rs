use super::fixture::StrategyFixture;
use super::report::{CaseReport, SuiteReport};
use super::signers::setup_signers_for;
use crate::chain::{overwrite_token_balance, ChainControl};
use crate::config::penguin::{
    RoleAddresses, ORCHESTRATOR_CONTRACT_NAME, REWARDER_PRESET, STRATEGY_CONTRACT_NAME,
};
use crate::contracts::{ArtifactStore, Erc20Handle, IglooMaster, StrategyPefiUsdcPgnl};
use crate::error::{AssertionError, HarnessError};
use crate::utils::constants::{
    DEFAULT_BALANCE_SLOT, DEFAULT_POOL_ID, DEFAULT_START_TIME, DEFAULT_TXN_AMOUNT,
    DEFAULT_WITH_UPDATE, SIGNER_FUNDING_WEI, WAD_U256,
};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolConstructor};
use std::str::FromStr;
use std::time::Instant;

pub const SUITE_NAME: &str = "LP Strategy tests for: penguin";
pub const DEPOSIT_CASE: &str = "strategy should be able to deposit";
pub const WITHDRAW_CASE: &str = "strategy should be able to withdraw";

/// Scenario knobs. `Default` is the Penguin PEFI/USDC.e pool 14 scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LpTestParams {
    pub start_time: U256,
    pub pool_id: U256,
    pub with_update: bool,
    /// Pool-token balance forced onto the wallet during setup.
    pub txn_amount: U256,
    pub balance_slot: U256,
    pub deposit_amount: U256,
    pub withdraw_amount: U256,
}

impl LpTestParams {
    pub fn new(start_time: U256, pool_id: U256, with_update: bool, txn_amount: U256) -> Self {
        Self {
            start_time,
            pool_id,
            with_update,
            txn_amount,
            ..Self::default()
        }
    }
}

impl Default for LpTestParams {
    fn default() -> Self {
        Self {
            start_time: U256::from(DEFAULT_START_TIME),
            pool_id: U256::from(DEFAULT_POOL_ID),
            with_update: DEFAULT_WITH_UPDATE,
            txn_amount: DEFAULT_TXN_AMOUNT,
            balance_slot: U256::from(DEFAULT_BALANCE_SLOT),
            // 20 ** 18 and 10 ** 18.
            deposit_amount: U256::from(20u64).pow(U256::from(18u64)),
            withdraw_amount: WAD_U256,
        }
    }
}

/// Who sends `deposit`/`withdraw` to the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyCaller {
    /// The deployed orchestrator's address, impersonated and funded.
    #[default]
    Orchestrator,
    Wallet,
}

impl FromStr for StrategyCaller {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "orchestrator" | "igloo_master" => Ok(StrategyCaller::Orchestrator),
            "wallet" => Ok(StrategyCaller::Wallet),
            other => Err(format!(
                "unknown strategy caller `{other}` (expected orchestrator|wallet)"
            )),
        }
    }
}

/// Whose pool-token balance the cases compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceHolder {
    #[default]
    Strategy,
    Wallet,
    Orchestrator,
    Address(Address),
}

impl BalanceHolder {
    pub fn resolve(&self, wallet: Address, strategy: Address, orchestrator: Address) -> Address {
        match self {
            BalanceHolder::Strategy => strategy,
            BalanceHolder::Wallet => wallet,
            BalanceHolder::Orchestrator => orchestrator,
            BalanceHolder::Address(addr) => *addr,
        }
    }
}

impl FromStr for BalanceHolder {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "strategy" => Ok(BalanceHolder::Strategy),
            "wallet" => Ok(BalanceHolder::Wallet),
            "orchestrator" | "igloo_master" => Ok(BalanceHolder::Orchestrator),
            other => Address::from_str(other)
                .map(BalanceHolder::Address)
                .map_err(|_| {
                    format!(
                        "unknown balance holder `{other}` (expected strategy|wallet|orchestrator|0x-address)"
                    )
                }),
        }
    }
}

/// Addresses and artifact names the suite is wired to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LpWiring {
    pub wallet: Address,
    pub pool_token: Address,
    pub reward_token: Address,
    pub rewarder: Address,
    pub roles: RoleAddresses,
    pub strategy_contract: String,
    pub orchestrator_contract: String,
    pub strategy_caller: StrategyCaller,
    pub balance_holder: BalanceHolder,
}

impl LpWiring {
    pub fn new(wallet: Address, pool_token: Address, reward_token: Address) -> Self {
        Self {
            wallet,
            pool_token,
            reward_token,
            rewarder: REWARDER_PRESET,
            roles: RoleAddresses::penguin(),
            strategy_contract: STRATEGY_CONTRACT_NAME.to_string(),
            orchestrator_contract: ORCHESTRATOR_CONTRACT_NAME.to_string(),
            strategy_caller: StrategyCaller::default(),
            balance_holder: BalanceHolder::default(),
        }
    }
}

enum Expect {
    Increase,
    Decrease,
}

pub struct LpStrategyTest {
    params: LpTestParams,
    wiring: LpWiring,
}

impl LpStrategyTest {
    pub fn new(params: LpTestParams, wiring: LpWiring) -> Self {
        Self { params, wiring }
    }

    pub fn params(&self) -> &LpTestParams {
        &self.params
    }

    pub fn wiring(&self) -> &LpWiring {
        &self.wiring
    }

    /// One-time suite setup. Any failure aborts the whole suite.
    pub async fn before<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
        artifacts: &ArtifactStore,
    ) -> Result<StrategyFixture, HarnessError> {
        let params = &self.params;
        let wiring = &self.wiring;
        tracing::info!(
            "[SETUP] start_time={} pool_id={} with_update={} txn_amount={} rewarder={}",
            params.start_time,
            params.pool_id,
            params.with_update,
            params.txn_amount,
            wiring.rewarder
        );

        let wallet = chain.impersonate_account(wiring.wallet).await?;
        tracing::info!("[SETUP] Impersonated wallet {}", wallet);

        let roles = setup_signers_for(chain, &wiring.roles).await?;

        overwrite_token_balance(
            chain,
            wiring.pool_token,
            wallet.address(),
            params.txn_amount,
            params.balance_slot,
        )
        .await?;
        let deposit_token = Erc20Handle::new(wiring.pool_token, wallet);

        let strategy_ctor = StrategyPefiUsdcPgnl::constructorCall {
            _pid: params.pool_id,
        }
        .abi_encode();
        let strategy = artifacts
            .factory(&wiring.strategy_contract)?
            .deploy(chain, &wallet, &strategy_ctor)
            .await?;

        let orchestrator_ctor = IglooMaster::constructorCall {
            _pefi: wiring.reward_token,
            _startTime: params.start_time,
            _dev: roles.dev.address(),
            _nest: roles.nest.address(),
            _nestAllocator: roles.nest_allocator.address(),
            _performanceFeeAddress: roles.performance_fee.address(),
        }
        .abi_encode();
        let orchestrator = artifacts
            .factory(&wiring.orchestrator_contract)?
            .deploy(chain, &wallet, &orchestrator_ctor)
            .await?;

        let approve = IglooMaster::modifyApprovedContractsCall {
            contractAddress: strategy,
            status: params.with_update,
        }
        .abi_encode();
        chain
            .send(&wallet, orchestrator, Bytes::from(approve))
            .await?;
        tracing::info!(
            "[SETUP] modifyApprovedContracts({}, {}) on {}",
            strategy,
            params.with_update,
            orchestrator
        );

        let strategy_caller = match wiring.strategy_caller {
            StrategyCaller::Wallet => wallet,
            StrategyCaller::Orchestrator => {
                let signer = chain.impersonate_account(orchestrator).await?;
                chain.set_balance(orchestrator, SIGNER_FUNDING_WEI).await?;
                signer
            }
        };
        let balance_holder = wiring
            .balance_holder
            .resolve(wallet.address(), strategy, orchestrator);
        tracing::info!(
            "[SETUP] Strategy caller {} ({:?}); balance holder {} ({:?})",
            strategy_caller,
            wiring.strategy_caller,
            balance_holder,
            wiring.balance_holder
        );

        Ok(StrategyFixture {
            wallet,
            roles,
            deposit_token,
            strategy,
            orchestrator,
            strategy_caller,
            balance_holder,
        })
    }

    pub async fn strategy_should_deposit<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
        fixture: &StrategyFixture,
    ) -> Result<(), HarnessError> {
        let data = StrategyPefiUsdcPgnl::depositCall {
            amount: self.params.deposit_amount,
        }
        .abi_encode();
        self.exercise(chain, fixture, data, Expect::Increase).await
    }

    pub async fn strategy_should_withdraw<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
        fixture: &StrategyFixture,
    ) -> Result<(), HarnessError> {
        let data = StrategyPefiUsdcPgnl::withdrawCall {
            amount: self.params.withdraw_amount,
        }
        .abi_encode();
        self.exercise(chain, fixture, data, Expect::Decrease).await
    }

    async fn exercise<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
        fixture: &StrategyFixture,
        data: Vec<u8>,
        expect: Expect,
    ) -> Result<(), HarnessError> {
        let holder = fixture.balance_holder;
        let before = fixture.holder_balance(chain).await?;
        chain
            .send(&fixture.strategy_caller, fixture.strategy, Bytes::from(data))
            .await?;
        let after = fixture.holder_balance(chain).await?;
        tracing::debug!("[CASE] holder={} before={} after={}", holder, before, after);

        match expect {
            Expect::Increase if after > before => Ok(()),
            Expect::Decrease if after < before => Ok(()),
            Expect::Increase => Err(AssertionError::BalanceNotIncreased {
                holder,
                before,
                after,
            }
            .into()),
            Expect::Decrease => Err(AssertionError::BalanceNotDecreased {
                holder,
                before,
                after,
            }
            .into()),
        }
    }

    /// `before`, then deposit and withdraw in order. Cases fail independently;
    /// a failed `before` runs none of them.
    pub async fn run<C: ChainControl + ?Sized>(
        &self,
        chain: &mut C,
        artifacts: &ArtifactStore,
    ) -> SuiteReport {
        let mut report = SuiteReport::new(SUITE_NAME);
        let fixture = match self.before(chain, artifacts).await {
            Ok(fixture) => fixture,
            Err(err) => {
                tracing::error!("[SETUP] before hook failed: {}", err);
                report.setup_error = Some(err.to_string());
                return report;
            }
        };

        let started = Instant::now();
        let outcome = self.strategy_should_deposit(chain, &fixture).await;
        report.cases.push(case_report(DEPOSIT_CASE, started, outcome));

        let started = Instant::now();
        let outcome = self.strategy_should_withdraw(chain, &fixture).await;
        report.cases.push(case_report(WITHDRAW_CASE, started, outcome));

        report
    }
}

fn case_report(name: &str, started: Instant, outcome: Result<(), HarnessError>) -> CaseReport {
    let error = outcome.err().map(|err| err.to_string());
    match &error {
        None => tracing::info!("[CASE] {} passed", name),
        Some(err) => tracing::warn!("[CASE] {} failed: {}", name, err),
    }
    CaseReport {
        name: name.to_string(),
        error,
        elapsed: started.elapsed(),
    }
}
