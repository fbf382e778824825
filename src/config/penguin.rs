//! Address book for the Penguin Finance deployment the LP strategy harness targets.

use alloy::primitives::{address, Address};

pub const DEV_ADDRESS: Address = address!("033489768527c7915f35bceb4fe084dd5aecf74b");
pub const NEST_ADDRESS: Address = address!("e9476e16fe488b90ada9ab5c7c2ada81014ba9ee");
// Same account as dev in the live deployment.
pub const NEST_ALLOCATOR_ADDRESS: Address = address!("033489768527c7915f35bceb4fe084dd5aecf74b");
pub const PERFORMANCE_FEE_ADDRESS: Address = address!("0043aaaaf96dcf7ecff8ac4908a05663f806adaf");

/// PEFI/USDC.e Pangolin LP token.
pub const POOL_TOKEN_PRESET: Address = address!("bA09679Ab223C6bdaf44D45Ba2d7279959289AB0");
pub const REWARDER_PRESET: Address = Address::ZERO;
/// PEFI, the IglooMaster reward token.
pub const REWARD_TOKEN_PRESET: Address = address!("e896cdeaac9615145c0ca09c8cd5c25bced6384c");

pub const STRATEGY_CONTRACT_NAME: &str = "StrategyPefiUsdcPgnl";
pub const ORCHESTRATOR_CONTRACT_NAME: &str = "IglooMaster";

/// Role addresses in the order Signer Setup returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAddresses {
    pub dev: Address,
    pub nest: Address,
    pub nest_allocator: Address,
    pub performance_fee: Address,
}

impl RoleAddresses {
    pub const fn penguin() -> Self {
        Self {
            dev: DEV_ADDRESS,
            nest: NEST_ADDRESS,
            nest_allocator: NEST_ALLOCATOR_ADDRESS,
            performance_fee: PERFORMANCE_FEE_ADDRESS,
        }
    }

    pub fn in_order(&self) -> [Address; 4] {
        [self.dev, self.nest, self.nest_allocator, self.performance_fee]
    }
}

impl Default for RoleAddresses {
    fn default() -> Self {
        Self::penguin()
    }
}
