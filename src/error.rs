use alloy::primitives::{Address, U256};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("assertion failed: {0}")]
    Assertion(#[from] AssertionError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    MissingConfig(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("control call `{method}` rejected: {reason}")]
    ControlRejected { method: String, reason: String },
    #[error("account {0} is not impersonated on this chain")]
    NotImpersonated(Address),
    #[error("{context} reverted: {reason}")]
    Reverted { context: String, reason: String },
    #[error("{context} halted: {reason}")]
    Halted { context: String, reason: String },
    #[error("failed to decode {0}")]
    Decode(String),
    #[error("state database failure: {0}")]
    Database(String),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no artifact named `{0}`")]
    NotFound(String),
    #[error("artifact `{name}` is malformed: {reason}")]
    Malformed { name: String, reason: String },
    #[error("artifact `{0}` has unlinked library references")]
    UnlinkedLibrary(String),
    #[error("artifact io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("expected balance of {holder} to increase: before={before} after={after}")]
    BalanceNotIncreased {
        holder: Address,
        before: U256,
        after: U256,
    },
    #[error("expected balance of {holder} to decrease: before={before} after={after}")]
    BalanceNotDecreased {
        holder: Address,
        before: U256,
        after: U256,
    },
}
