//! Penguin LP strategy harness.
//!
//! Drives `StrategyPefiUsdcPgnl` and `IglooMaster` on a forked Avalanche
//! chain: impersonates the protocol role accounts, forces the wallet's
//! pool-token balance, deploys both contracts from Hardhat artifacts and
//! checks that deposit/withdraw move the holder's balance the right way.
//! The chain is either an external Hardhat/Anvil node or an in-process revm
//! fork (`chain`).

pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod fork_db;
pub mod harness;
pub mod runtime;
pub mod utils;
