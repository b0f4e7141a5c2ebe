use super::gas::GasPolicy;
use super::types::ApprovalOutcome;
use crate::chain::contracts::IERC20;
use crate::chain::{ChainClient, Erc20Client};
use crate::swap_error::{SwapError, SwapResult};
use crate::utils::ApprovalPolicy;
use crate::utils::constants::UNLIMITED_ALLOWANCE;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Makes sure the router may spend what a trade needs, submitting `approve` only when the current
/// allowance is short. Calling it again with the same requirement submits nothing.
pub struct AllowanceManager {
    erc20: Arc<dyn Erc20Client>,
    chain: Arc<dyn ChainClient>,
    gas: GasPolicy,
    policy: ApprovalPolicy,
    receipt_timeout: Duration,
}

impl AllowanceManager {
    pub fn new(
        erc20: Arc<dyn Erc20Client>,
        chain: Arc<dyn ChainClient>,
        gas: GasPolicy,
        policy: ApprovalPolicy,
        receipt_timeout: Duration,
    ) -> Self {
        Self { erc20, chain, gas, policy, receipt_timeout }
    }

    pub async fn ensure_allowance(&self, owner: Address, spender: Address, token: Address, required: U256) -> SwapResult<ApprovalOutcome> {
        let failed = |reason: String| SwapError::ApprovalFailed { token, spender, reason };

        let current = self.erc20.allowance(token, owner, spender).await.map_err(|e| failed(format!("allowance read: {e}")))?;
        if current >= required {
            info!("Allowance of {} for {} already sufficient ({} >= {})", token, spender, current, required);
            return Ok(ApprovalOutcome::AlreadySufficient { current });
        }

        let unlimited = self.policy == ApprovalPolicy::Unlimited;
        let amount = if unlimited {
            warn!("Approving unlimited allowance of {} for {}", token, spender);
            UNLIMITED_ALLOWANCE
        } else {
            required
        };

        let input = IERC20::approveCall { spender, amount }.abi_encode();
        let tx = self.gas.prepare(self.chain.as_ref(), token, U256::ZERO, input.into()).await.map_err(|e| failed(e.to_string()))?;
        let tx_hash = self.chain.submit(tx).await.map_err(|e| failed(format!("submit approve: {e}")))?;
        info!("Approval sent for {} to {}: {}", token, spender, tx_hash);

        let receipt = self.chain.wait_for_receipt(tx_hash, self.receipt_timeout).await.map_err(|e| failed(format!("approve {tx_hash}: {e}")))?;
        if !receipt.is_success() {
            return Err(failed(format!("approve {tx_hash} reverted")));
        }

        let allowance = self.erc20.allowance(token, owner, spender).await.map_err(|e| failed(format!("allowance re-read: {e}")))?;
        if allowance < required {
            return Err(failed(format!("allowance still {allowance} after approve {tx_hash}, need {required}")));
        }

        info!("Approval confirmed in block {:?}", receipt.block_number);
        Ok(ApprovalOutcome::Approved { tx_hash, allowance, unlimited })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChain;

    const TOKEN: Address = Address::repeat_byte(0xa1);

    fn manager(mock: &Arc<MockChain>, policy: ApprovalPolicy) -> AllowanceManager {
        AllowanceManager::new(mock.clone(), mock.clone(), GasPolicy::new(100_000, 110), policy, Duration::from_secs(5))
    }

    fn funded_mock() -> Arc<MockChain> {
        let mock = Arc::new(MockChain::new());
        mock.set_native_balance(MockChain::SIGNER, U256::from(10u64).pow(U256::from(18u64)));
        mock
    }

    #[tokio::test]
    async fn test_sufficient_allowance_sends_nothing() {
        let mock = funded_mock();
        mock.set_allowance(TOKEN, MockChain::SIGNER, MockChain::ROUTER, U256::from(500u64));

        let outcome = manager(&mock, ApprovalPolicy::Exact)
            .ensure_allowance(MockChain::SIGNER, MockChain::ROUTER, TOKEN, U256::from(500u64))
            .await
            .unwrap();

        assert_eq!(outcome, ApprovalOutcome::AlreadySufficient { current: U256::from(500u64) });
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_exact_approval_is_idempotent() {
        let mock = funded_mock();
        let manager = manager(&mock, ApprovalPolicy::Exact);

        let first = manager.ensure_allowance(MockChain::SIGNER, MockChain::ROUTER, TOKEN, U256::from(700u64)).await.unwrap();
        let second = manager.ensure_allowance(MockChain::SIGNER, MockChain::ROUTER, TOKEN, U256::from(700u64)).await.unwrap();

        assert!(first.submitted_approval());
        assert!(!second.submitted_approval());
        let sent = mock.sent_to(TOKEN);
        assert_eq!(sent.len(), 1);
        let call = IERC20::approveCall::abi_decode(&sent[0].input).unwrap();
        assert_eq!(call.spender, MockChain::ROUTER);
        assert_eq!(call.amount, U256::from(700u64));
    }

    #[tokio::test]
    async fn test_unlimited_policy_approves_max() {
        let mock = funded_mock();

        let outcome = manager(&mock, ApprovalPolicy::Unlimited)
            .ensure_allowance(MockChain::SIGNER, MockChain::ROUTER, TOKEN, U256::from(1u64))
            .await
            .unwrap();

        match outcome {
            ApprovalOutcome::Approved { allowance, unlimited, .. } => {
                assert_eq!(allowance, U256::MAX);
                assert!(unlimited);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reverted_approval_fails() {
        let mock = funded_mock();
        mock.set_revert_approvals(true);

        let err = manager(&mock, ApprovalPolicy::Exact)
            .ensure_allowance(MockChain::SIGNER, MockChain::ROUTER, TOKEN, U256::from(10u64))
            .await
            .unwrap_err();

        assert!(matches!(err, SwapError::ApprovalFailed { .. }));
    }

    #[tokio::test]
    async fn test_allowance_unchanged_after_approval_fails() {
        let mock = funded_mock();
        mock.set_ignore_approvals(true);

        let err = manager(&mock, ApprovalPolicy::Exact)
            .ensure_allowance(MockChain::SIGNER, MockChain::ROUTER, TOKEN, U256::from(10u64))
            .await
            .unwrap_err();

        assert!(matches!(err, SwapError::ApprovalFailed { .. }));
        assert_eq!(mock.sent_transactions().len(), 1);
    }
}
