use crate::chain::rpc::NodeFlavor;
use crate::config::chains::ChainConfig;
use crate::config::penguin::{ORCHESTRATOR_CONTRACT_NAME, REWARDER_PRESET, STRATEGY_CONTRACT_NAME};
use crate::error::{ConfigError, Result};
use crate::harness::{BalanceHolder, LpTestParams, LpWiring, StrategyCaller};
use crate::runtime::args::parse_bool_flag;
use crate::utils::hex::to_u256;
use alloy::primitives::{Address, U256};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
const DEFAULT_CHAIN_ID: u64 = 43114;
const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

pub struct HarnessConfig {
    pub eth_rpc_url: String,
    pub chain_id: u64,
    pub fork_block_number: Option<u64>,
    pub node_flavor: NodeFlavor,
    pub artifacts_dir: PathBuf,
    pub params: LpTestParams,
    pub wiring: LpWiring,
}

fn validate_http_url(name: &str, raw: &str) -> Result<()> {
    let parsed = raw.parse::<reqwest::Url>().map_err(|e| {
        ConfigError::InvalidConfig(format!("{name} must be a valid URL, got `{raw}`: {e}"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidConfig(format!(
            "{name} must use http(s) scheme, got `{other}`"
        ))
        .into()),
    }
}

/// Typed reads over a key lookup, so tests can feed a map instead of the
/// process environment.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn address(&self, name: &str) -> std::result::Result<Option<Address>, ConfigError> {
        self.get(name)
            .map(|raw| {
                Address::from_str(&raw).map_err(|e| {
                    ConfigError::InvalidConfig(format!(
                        "{name} must be a 0x-prefixed address, got `{raw}`: {e}"
                    ))
                })
            })
            .transpose()
    }

    fn required_address(&self, name: &str) -> std::result::Result<Address, ConfigError> {
        self.address(name)?
            .ok_or_else(|| ConfigError::MissingConfig(format!("{name} must be set")))
    }

    fn u256(&self, name: &str, default: U256) -> std::result::Result<U256, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => to_u256(&raw).ok_or_else(|| {
                ConfigError::InvalidConfig(format!(
                    "{name} must be a decimal or 0x-hex integer, got `{raw}`"
                ))
            }),
        }
    }

    fn u64(&self, name: &str) -> std::result::Result<Option<u64>, ConfigError> {
        self.get(name)
            .map(|raw| {
                raw.parse::<u64>().map_err(|_| {
                    ConfigError::InvalidConfig(format!("{name} must be a valid u64, got `{raw}`"))
                })
            })
            .transpose()
    }

    fn bool(&self, name: &str, default: bool) -> std::result::Result<bool, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => parse_bool_flag(&raw).ok_or_else(|| {
                ConfigError::InvalidConfig(format!("{name} must be a boolean, got `{raw}`"))
            }),
        }
    }

    fn parsed<T>(&self, name: &str) -> std::result::Result<T, ConfigError>
    where
        T: FromStr<Err = String> + Default,
    {
        match self.get(name) {
            None => Ok(T::default()),
            Some(raw) => T::from_str(&raw)
                .map_err(|e| ConfigError::InvalidConfig(format!("{name}: {e}"))),
        }
    }
}

impl HarnessConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let eth_rpc_url = vars
            .get("ETH_RPC_URL")
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        validate_http_url("ETH_RPC_URL", &eth_rpc_url)?;
        let chain_id = vars.u64("CHAIN_ID")?.unwrap_or(DEFAULT_CHAIN_ID);
        let fork_block_number = vars.u64("FORK_BLOCK_NUMBER")?;
        let node_flavor: NodeFlavor = vars.parsed("NODE_FLAVOR")?;
        let artifacts_dir = PathBuf::from(
            vars.get("ARTIFACTS_DIR")
                .unwrap_or_else(|| DEFAULT_ARTIFACTS_DIR.to_string()),
        );

        let defaults = LpTestParams::default();
        let params = LpTestParams {
            start_time: vars.u256("LP_START_TIME", defaults.start_time)?,
            pool_id: vars.u256("LP_POOL_ID", defaults.pool_id)?,
            with_update: vars.bool("LP_WITH_UPDATE", defaults.with_update)?,
            txn_amount: vars.u256("LP_TXN_AMOUNT", defaults.txn_amount)?,
            balance_slot: vars.u256("LP_BALANCE_SLOT", defaults.balance_slot)?,
            deposit_amount: vars.u256("LP_DEPOSIT_AMOUNT", defaults.deposit_amount)?,
            withdraw_amount: vars.u256("LP_WITHDRAW_AMOUNT", defaults.withdraw_amount)?,
        };
        if params.deposit_amount.is_zero() || params.withdraw_amount.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "LP_DEPOSIT_AMOUNT and LP_WITHDRAW_AMOUNT must be non-zero".to_string(),
            )
            .into());
        }

        let mut wiring = LpWiring::new(
            vars.required_address("WALLET_ADDR")?,
            vars.required_address("POOL_TOKEN_ADDR")?,
            vars.required_address("REWARD_TOKEN_ADDR")?,
        );
        wiring.rewarder = vars.address("REWARDER_ADDR")?.unwrap_or(REWARDER_PRESET);
        wiring.strategy_contract = vars
            .get("STRATEGY_CONTRACT")
            .unwrap_or_else(|| STRATEGY_CONTRACT_NAME.to_string());
        wiring.orchestrator_contract = vars
            .get("ORCHESTRATOR_CONTRACT")
            .unwrap_or_else(|| ORCHESTRATOR_CONTRACT_NAME.to_string());
        wiring.strategy_caller = vars.parsed::<StrategyCaller>("LP_STRATEGY_CALLER")?;
        wiring.balance_holder = vars.parsed::<BalanceHolder>("LP_BALANCE_HOLDER")?;

        Ok(Self {
            eth_rpc_url,
            chain_id,
            fork_block_number,
            node_flavor,
            artifacts_dir,
            params,
            wiring,
        })
    }

    pub fn chain(&self) -> ChainConfig {
        ChainConfig::get(self.chain_id)
    }

    /// Resolved configuration, one key per line, for `DASHBOARD_EXPLAIN_CONFIG`.
    pub fn explain(&self) -> Vec<String> {
        let chain = self.chain();
        vec![
            format!("ETH_RPC_URL={}", self.eth_rpc_url),
            format!("CHAIN_ID={} ({})", self.chain_id, chain.name),
            format!(
                "FORK_BLOCK_NUMBER={}",
                self.fork_block_number
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "latest".to_string())
            ),
            format!("NODE_FLAVOR={:?}", self.node_flavor),
            format!("ARTIFACTS_DIR={}", self.artifacts_dir.display()),
            format!("WALLET_ADDR={}", self.wiring.wallet),
            format!("POOL_TOKEN_ADDR={}", self.wiring.pool_token),
            format!("REWARD_TOKEN_ADDR={}", self.wiring.reward_token),
            format!("REWARDER_ADDR={}", self.wiring.rewarder),
            format!("STRATEGY_CONTRACT={}", self.wiring.strategy_contract),
            format!("ORCHESTRATOR_CONTRACT={}", self.wiring.orchestrator_contract),
            format!("LP_START_TIME={}", self.params.start_time),
            format!("LP_POOL_ID={}", self.params.pool_id),
            format!("LP_WITH_UPDATE={}", self.params.with_update),
            format!("LP_TXN_AMOUNT={}", self.params.txn_amount),
            format!("LP_BALANCE_SLOT={}", self.params.balance_slot),
            format!("LP_DEPOSIT_AMOUNT={}", self.params.deposit_amount),
            format!("LP_WITHDRAW_AMOUNT={}", self.params.withdraw_amount),
            format!("LP_STRATEGY_CALLER={:?}", self.wiring.strategy_caller),
            format!("LP_BALANCE_HOLDER={:?}", self.wiring.balance_holder),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::HarnessConfig;
    use crate::chain::rpc::NodeFlavor;
    use crate::error::{ConfigError, HarnessError};
    use crate::harness::{BalanceHolder, LpTestParams, StrategyCaller};
    use alloy::primitives::{address, U256};
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> crate::error::Result<HarnessConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HarnessConfig::from_lookup(move |key| map.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("WALLET_ADDR", "0x000000000000000000000000000000000000dEaD"),
        ("POOL_TOKEN_ADDR", "0xbA09679Ab223C6bdaf44D45Ba2d7279959289AB0"),
        ("REWARD_TOKEN_ADDR", "0xe896cdeaac9615145c0ca09c8cd5c25bced6384c"),
    ];

    #[test]
    fn test_defaults_fill_everything_but_addresses() {
        let cfg = load(&REQUIRED).expect("config");
        assert_eq!(cfg.eth_rpc_url, "http://127.0.0.1:8545");
        assert_eq!(cfg.chain_id, 43114);
        assert_eq!(cfg.fork_block_number, None);
        assert_eq!(cfg.node_flavor, NodeFlavor::Hardhat);
        assert_eq!(cfg.params, LpTestParams::default());
        assert_eq!(
            cfg.wiring.pool_token,
            address!("bA09679Ab223C6bdaf44D45Ba2d7279959289AB0")
        );
        assert_eq!(cfg.wiring.strategy_contract, "StrategyPefiUsdcPgnl");
        assert_eq!(cfg.wiring.strategy_caller, StrategyCaller::Orchestrator);
        assert_eq!(cfg.wiring.balance_holder, BalanceHolder::Strategy);
        assert!(cfg.explain().iter().any(|line| line == "LP_POOL_ID=14"));
    }

    #[test]
    fn test_missing_wallet_is_reported_by_name() {
        let err = load(&REQUIRED[1..]).err().expect("must fail");
        match err {
            HarnessError::Config(ConfigError::MissingConfig(msg)) => {
                assert!(msg.contains("WALLET_ADDR"), "{msg}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("ETH_RPC_URL", "https://api.avax.network/ext/bc/C/rpc"),
            ("FORK_BLOCK_NUMBER", "6000000"),
            ("NODE_FLAVOR", "anvil"),
            ("LP_POOL_ID", "3"),
            ("LP_WITH_UPDATE", "false"),
            ("LP_TXN_AMOUNT", "0x10"),
            ("LP_STRATEGY_CALLER", "wallet"),
            ("LP_BALANCE_HOLDER", "wallet"),
        ]);
        let cfg = load(&pairs).expect("config");
        assert_eq!(cfg.fork_block_number, Some(6_000_000));
        assert_eq!(cfg.node_flavor, NodeFlavor::Anvil);
        assert_eq!(cfg.params.pool_id, U256::from(3u64));
        assert!(!cfg.params.with_update);
        assert_eq!(cfg.params.txn_amount, U256::from(16u64));
        assert_eq!(cfg.wiring.strategy_caller, StrategyCaller::Wallet);
        assert_eq!(cfg.wiring.balance_holder, BalanceHolder::Wallet);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut bad_url = REQUIRED.to_vec();
        bad_url.push(("ETH_RPC_URL", "ws://127.0.0.1:8546"));
        assert!(load(&bad_url).is_err());

        let mut bad_amount = REQUIRED.to_vec();
        bad_amount.push(("LP_TXN_AMOUNT", "lots"));
        assert!(load(&bad_amount).is_err());

        let mut zero_deposit = REQUIRED.to_vec();
        zero_deposit.push(("LP_DEPOSIT_AMOUNT", "0"));
        assert!(load(&zero_deposit).is_err());

        let mut bad_addr = REQUIRED.to_vec();
        bad_addr[0] = ("WALLET_ADDR", "0x1234");
        assert!(load(&bad_addr).is_err());
    }
}
