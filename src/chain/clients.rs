use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use eyre::Result;
use serde::Serialize;
use std::time::Duration;

/// EIP-1559 fee caps, in wei per gas.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FeeData {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// A fully priced transaction ready to be signed by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl PreparedTransaction {
    /// Worst case native spend: attached value plus the full gas budget at the fee cap.
    pub fn max_cost(&self) -> U256 {
        let gas_budget = U256::from(self.gas_limit).saturating_mul(U256::from(self.max_fee_per_gas));
        self.value.saturating_add(gas_budget)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Reverted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReceiptSummary {
    pub tx_hash: B256,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl ReceiptSummary {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }

    pub fn fee_paid(&self) -> U256 {
        U256::from(self.gas_used).saturating_mul(U256::from(self.effective_gas_price))
    }
}

/// Error raised by a remote call, with the decoded `Error(string)` revert message when the node
/// returned one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RpcCallError {
    pub message: String,
    pub revert_reason: Option<String>,
}

impl RpcCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), revert_reason: None }
    }

    pub fn reverted(message: impl Into<String>, revert_reason: impl Into<String>) -> Self {
        Self { message: message.into(), revert_reason: Some(revert_reason.into()) }
    }

    /// Pull the revert reason out of an error chain, if any link is an `RpcCallError`.
    pub fn revert_reason_of(report: &eyre::Report) -> Option<String> {
        report.chain().find_map(|cause| cause.downcast_ref::<RpcCallError>()).and_then(|e| e.revert_reason.clone())
    }
}

#[async_trait]
pub trait Erc20Client: Send + Sync {
    async fn symbol(&self, token: Address) -> Result<String>;

    async fn decimals(&self, token: Address) -> Result<u8>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
}

#[async_trait]
pub trait RouterClient: Send + Sync {
    /// Output amount for every hop of `path`; the last entry is the final output.
    async fn get_amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>>;

    async fn factory(&self) -> Result<Address>;
}

#[async_trait]
pub trait FactoryClient: Send + Sync {
    /// Pool address for the pair at `fee`, or `Address::ZERO` when no pool exists.
    async fn get_pool(&self, token_a: Address, token_b: Address, fee: u32) -> Result<Address>;
}

#[async_trait]
pub trait QuoterClient: Send + Sync {
    async fn quote_exact_input_single(&self, token_in: Address, token_out: Address, fee: u32, amount_in: U256) -> Result<U256>;
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Account that signs and pays for submitted transactions.
    fn signer_address(&self) -> Address;

    async fn chain_id(&self) -> Result<u64>;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    /// Current network fee estimate, before any headroom is applied.
    async fn fee_data(&self) -> Result<FeeData>;

    async fn submit(&self, tx: PreparedTransaction) -> Result<B256>;

    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<ReceiptSummary>;

    /// Re-run `tx` as a call against the state it was mined on, so a revert surfaces its reason
    /// as an `RpcCallError`. Returns `Ok` when the replay does not revert.
    async fn replay(&self, tx: &PreparedTransaction, block_number: Option<u64>) -> Result<()>;
}

/// Everything the swap pipeline needs from the chain, behind one handle.
pub trait SwapBackend: ChainClient + Erc20Client + RouterClient + FactoryClient + QuoterClient {}

impl<T> SwapBackend for T where T: ChainClient + Erc20Client + RouterClient + FactoryClient + QuoterClient {}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn test_max_cost() {
        let tx = PreparedTransaction {
            to: Address::ZERO,
            value: U256::from(1_000u64),
            input: Bytes::new(),
            gas_limit: 21_000,
            max_fee_per_gas: 10,
            max_priority_fee_per_gas: 1,
        };
        assert_eq!(tx.max_cost(), U256::from(211_000u64));
    }

    #[test]
    fn test_revert_reason_survives_context() {
        let report = eyre::Report::new(RpcCallError::reverted("execution reverted", "INSUFFICIENT_OUTPUT_AMOUNT"));
        let wrapped: eyre::Result<()> = Err(report).wrap_err("submit swap");

        let reason = RpcCallError::revert_reason_of(&wrapped.unwrap_err());
        assert_eq!(reason.as_deref(), Some("INSUFFICIENT_OUTPUT_AMOUNT"));
    }
}
