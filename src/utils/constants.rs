use alloy::primitives::U256;

/// Standard WAD (10^18)
pub const WAD_U256: U256 = U256::from_limbs([1000000000000000000, 0, 0, 0]);

/// Native balance given to every impersonated role signer (`0x10000000000000000000000`, 2^88 wei).
pub const SIGNER_FUNDING_WEI: U256 = U256::from_limbs([0, 1 << 24, 0, 0]);

/// 25_000 * 10^18, the default amount written into the wallet's pool-token balance.
pub const DEFAULT_TXN_AMOUNT: U256 = U256::from_limbs([0x40b1_f852_bda0_0000, 0x54b, 0, 0]);

pub const DEFAULT_START_TIME: u64 = 1_634_614_064;
pub const DEFAULT_POOL_ID: u64 = 14;
pub const DEFAULT_WITH_UPDATE: bool = true;

/// Storage index of the pool token's `balances` mapping.
pub const DEFAULT_BALANCE_SLOT: u64 = 1;

/// Per-transaction gas limit for locally executed calls and deployments.
pub const LOCAL_TX_GAS_LIMIT: u64 = 30_000_000;
