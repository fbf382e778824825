//! The LP strategy suite: role signer setup, the `before` fixture, and the
//! deposit/withdraw cases.

pub mod driver;
pub mod fixture;
pub mod report;
pub mod signers;

pub use driver::{
    BalanceHolder, LpStrategyTest, LpTestParams, LpWiring, StrategyCaller, DEPOSIT_CASE,
    SUITE_NAME, WITHDRAW_CASE,
};
pub use fixture::StrategyFixture;
pub use report::{CaseReport, SuiteReport};
pub use signers::{setup_signers, setup_signers_for, RoleSigners};
