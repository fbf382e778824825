use crate::chain::{ChainControl, Signer};
use crate::config::penguin::RoleAddresses;
use crate::error::ChainError;
use crate::utils::constants::SIGNER_FUNDING_WEI;

/// The four protocol role accounts, impersonated and funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSigners {
    pub dev: Signer,
    pub nest: Signer,
    pub nest_allocator: Signer,
    pub performance_fee: Signer,
}

impl RoleSigners {
    /// `[dev, nest, nest_allocator, performance_fee]`.
    pub fn in_order(&self) -> [Signer; 4] {
        [self.dev, self.nest, self.nest_allocator, self.performance_fee]
    }
}

/// Impersonate and fund the Penguin role accounts.
pub async fn setup_signers<C: ChainControl + ?Sized>(
    chain: &mut C,
) -> Result<RoleSigners, ChainError> {
    setup_signers_for(chain, &RoleAddresses::penguin()).await
}

pub async fn setup_signers_for<C: ChainControl + ?Sized>(
    chain: &mut C,
    roles: &RoleAddresses,
) -> Result<RoleSigners, ChainError> {
    let [dev, nest, nest_allocator, performance_fee] = roles.in_order();

    let dev = chain.impersonate_account(dev).await?;
    let nest = chain.impersonate_account(nest).await?;
    let nest_allocator = chain.impersonate_account(nest_allocator).await?;
    let performance_fee = chain.impersonate_account(performance_fee).await?;
    let signers = RoleSigners {
        dev,
        nest,
        nest_allocator,
        performance_fee,
    };

    for signer in signers.in_order() {
        chain.set_balance(signer.address(), SIGNER_FUNDING_WEI).await?;
    }
    tracing::info!(
        "[SIGNERS] dev={} nest={} nest_allocator={} performance_fee={} funded with {} wei each",
        signers.dev,
        signers.nest,
        signers.nest_allocator,
        signers.performance_fee,
        SIGNER_FUNDING_WEI
    );
    Ok(signers)
}
