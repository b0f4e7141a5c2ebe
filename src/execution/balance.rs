use crate::chain::{ChainClient, Erc20Client};
use crate::swap_error::{SwapError, SwapResult};
use crate::utils::constants::NATIVE;
use alloy_primitives::{Address, I256, U256};
use eyre::WrapErr;
use std::sync::Arc;

/// Measures what a trade actually delivered by sampling the destination balance before and after.
pub struct BalanceVerifier {
    erc20: Arc<dyn Erc20Client>,
    chain: Arc<dyn ChainClient>,
}

impl BalanceVerifier {
    pub fn new(erc20: Arc<dyn Erc20Client>, chain: Arc<dyn ChainClient>) -> Self {
        Self { erc20, chain }
    }

    /// Native coin when `token` is `NATIVE`, the ERC-20 balance otherwise.
    pub async fn balance_of(&self, owner: Address, token: Address) -> SwapResult<U256> {
        let balance = if token == NATIVE {
            self.chain.native_balance(owner).await.wrap_err("native balance")?
        } else {
            self.erc20.balance_of(token, owner).await.wrap_err_with(|| format!("balanceOf {token}"))?
        };
        Ok(balance)
    }

    /// Signed change since `before`. May be negative for a native destination once gas is paid.
    pub async fn verify(&self, owner: Address, token: Address, before: U256) -> SwapResult<I256> {
        let after = self.balance_of(owner, token).await?;
        signed_delta(before, after)
    }
}

pub fn signed_delta(before: U256, after: U256) -> SwapResult<I256> {
    let to_signed = |v: U256| I256::try_from(v).map_err(|e| SwapError::Internal(eyre::eyre!("balance {v} out of range: {e}")));
    Ok(to_signed(after)? - to_signed(before)?)
}
