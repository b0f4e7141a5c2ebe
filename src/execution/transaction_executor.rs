use super::gas::GasPolicy;
use crate::chain::contracts::{ISwapRouter, IUniswapV2Router02};
use crate::chain::{ChainClient, PreparedTransaction, ReceiptSummary, RpcCallError};
use crate::logic::{Quote, SwapIntent};
use crate::swap_error::{SwapError, SwapResult};
use crate::utils::RouterKind;
use alloy_primitives::aliases::{U24, U160};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use eyre::eyre;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

/// Encodes the router call for a quoted trade, submits it and waits for a successful receipt.
///
/// A mined revert becomes `SwapError::Reverted`, with the reason recovered by replaying the call.
pub struct SwapExecutor {
    chain: Arc<dyn ChainClient>,
    gas: GasPolicy,
    router_kind: RouterKind,
    router: Address,
    receipt_timeout: Duration,
}

impl SwapExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, gas: GasPolicy, router_kind: RouterKind, router: Address, receipt_timeout: Duration) -> Self {
        Self { chain, gas, router_kind, router, receipt_timeout }
    }

    /// Native value to attach and the router calldata.
    ///
    /// The quote's path already has the wrapped token in place of native; whether to send value
    /// or unwrap the output is decided from the intent.
    pub fn build_call(&self, intent: &SwapIntent, quote: &Quote, recipient: Address, deadline: U256) -> SwapResult<(U256, Bytes)> {
        match self.router_kind {
            RouterKind::Classic => Ok(self.build_classic(intent, quote, recipient, deadline)),
            RouterKind::Concentrated => self.build_concentrated(intent, quote, recipient, deadline),
        }
    }

    fn build_classic(&self, intent: &SwapIntent, quote: &Quote, recipient: Address, deadline: U256) -> (U256, Bytes) {
        let path = quote.path.addresses();
        if intent.is_native_in() {
            let call = IUniswapV2Router02::swapExactETHForTokensCall { amountOutMin: quote.min_out, path, to: recipient, deadline };
            return (intent.amount_in, call.abi_encode().into());
        }
        let input = if intent.is_native_out() {
            IUniswapV2Router02::swapExactTokensForETHCall {
                amountIn: intent.amount_in,
                amountOutMin: quote.min_out,
                path,
                to: recipient,
                deadline,
            }
            .abi_encode()
        } else {
            IUniswapV2Router02::swapExactTokensForTokensCall {
                amountIn: intent.amount_in,
                amountOutMin: quote.min_out,
                path,
                to: recipient,
                deadline,
            }
            .abi_encode()
        };
        (U256::ZERO, input.into())
    }

    fn build_concentrated(&self, intent: &SwapIntent, quote: &Quote, recipient: Address, deadline: U256) -> SwapResult<(U256, Bytes)> {
        let fee_tier = quote.fee_tier.ok_or_else(|| SwapError::Internal(eyre!("single pool quote without fee tier")))?;
        // unwrapping needs the wrapped output parked at the router first
        let swap_recipient = if intent.is_native_out() { self.router } else { recipient };
        let params = ISwapRouter::ExactInputSingleParams {
            tokenIn: quote.path.first().get_address(),
            tokenOut: quote.path.last().get_address(),
            fee: U24::from(fee_tier.fee()),
            recipient: swap_recipient,
            deadline,
            amountIn: intent.amount_in,
            amountOutMinimum: quote.min_out,
            sqrtPriceLimitX96: U160::ZERO,
        };
        let value = if intent.is_native_in() { intent.amount_in } else { U256::ZERO };
        let swap = ISwapRouter::exactInputSingleCall { params }.abi_encode();

        if !intent.is_native_out() {
            return Ok((value, swap.into()));
        }
        let unwrap = ISwapRouter::unwrapWETH9Call { amountMinimum: quote.min_out, recipient }.abi_encode();
        let multicall = ISwapRouter::multicallCall { data: vec![swap.into(), unwrap.into()] }.abi_encode();
        Ok((value, multicall.into()))
    }

    pub async fn execute(&self, intent: &SwapIntent, quote: &Quote) -> SwapResult<ReceiptSummary> {
        let trader = self.chain.signer_address();
        let deadline = intent.deadline_from(unix_now());
        let (value, input) = self.build_call(intent, quote, trader, deadline)?;

        let tx = self.gas.prepare(self.chain.as_ref(), self.router, value, input).await?;
        self.check_gas_funds(trader, &tx).await?;

        let tx_hash = self.chain.submit(tx.clone()).await.map_err(|e| {
            let revert_reason = RpcCallError::revert_reason_of(&e);
            error!("Swap submission failed: {} (revert: {:?})", e, revert_reason);
            SwapError::SwapExecutionFailed { reason: e.to_string(), revert_reason, tx_hash: None }
        })?;
        info!("Swap sent: {}", tx_hash);

        let receipt = self.chain.wait_for_receipt(tx_hash, self.receipt_timeout).await.map_err(|e| SwapError::SwapExecutionFailed {
            reason: format!("waiting for receipt: {e}"),
            revert_reason: RpcCallError::revert_reason_of(&e),
            tx_hash: Some(tx_hash),
        })?;
        info!("Swap {} mined in block {:?} with status {:?}", tx_hash, receipt.block_number, receipt.status);

        if !receipt.is_success() {
            let revert_reason = self.revert_reason_of(&tx, receipt.block_number).await;
            return Err(SwapError::Reverted { tx_hash, block_number: receipt.block_number, revert_reason });
        }
        Ok(receipt)
    }

    /// Receipts carry no revert data, so the reason comes from replaying the call. `None` when the
    /// replay does not revert or the node gives no decodable reason.
    async fn revert_reason_of(&self, tx: &PreparedTransaction, block_number: Option<u64>) -> Option<String> {
        match self.chain.replay(tx, block_number).await {
            Ok(()) => None,
            Err(e) => {
                debug!("Replay of reverted swap: {}", e);
                RpcCallError::revert_reason_of(&e)
            }
        }
    }

    /// Value plus the full gas budget must be covered before anything is sent.
    async fn check_gas_funds(&self, trader: Address, tx: &PreparedTransaction) -> SwapResult<()> {
        let available = self.chain.native_balance(trader).await?;
        let required = tx.max_cost();
        if available < required {
            return Err(SwapError::InsufficientGasFunds { required, available });
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChain;
    use crate::logic::{FeeTier, Slippage, SwapPath};
    use crate::utils::constants::NATIVE;
    use crate::utils::{Token, TokenWrapper};

    const TOKEN: Address = Address::repeat_byte(0xa1);

    fn token(address: Address) -> TokenWrapper {
        Arc::new(Token::new(address))
    }

    fn intent(from: Address, to: Address, amount: u64) -> SwapIntent {
        SwapIntent::new(from, to, U256::from(amount), Slippage::from_bps(100).unwrap(), Duration::from_secs(600))
    }

    fn executor(mock: &Arc<MockChain>, kind: RouterKind) -> SwapExecutor {
        SwapExecutor::new(mock.clone(), GasPolicy::new(300_000, 110), kind, MockChain::ROUTER, Duration::from_secs(5))
    }

    #[test]
    fn test_classic_native_in_attaches_value() {
        let mock = Arc::new(MockChain::new());
        let path = SwapPath::direct(token(MockChain::WRAPPED_NATIVE), token(TOKEN)).unwrap();
        let intent = intent(NATIVE, TOKEN, 1_000);
        let quote = Quote::new(path, None, intent.amount_in, U256::from(100u64), intent.slippage);

        let (value, input) = executor(&mock, RouterKind::Classic).build_call(&intent, &quote, MockChain::SIGNER, U256::from(9u64)).unwrap();

        assert_eq!(value, U256::from(1_000u64));
        let call = IUniswapV2Router02::swapExactETHForTokensCall::abi_decode(&input).unwrap();
        assert_eq!(call.amountOutMin, U256::from(99u64));
        assert_eq!(call.path, vec![MockChain::WRAPPED_NATIVE, TOKEN]);
        assert_eq!(call.deadline, U256::from(9u64));
    }

    #[test]
    fn test_classic_native_out_uses_tokens_for_eth() {
        let mock = Arc::new(MockChain::new());
        let path = SwapPath::direct(token(TOKEN), token(MockChain::WRAPPED_NATIVE)).unwrap();
        let intent = intent(TOKEN, NATIVE, 1_000);
        let quote = Quote::new(path, None, intent.amount_in, U256::from(200u64), intent.slippage);

        let (value, input) = executor(&mock, RouterKind::Classic).build_call(&intent, &quote, MockChain::SIGNER, U256::from(9u64)).unwrap();

        assert!(value.is_zero());
        let call = IUniswapV2Router02::swapExactTokensForETHCall::abi_decode(&input).unwrap();
        assert_eq!(call.amountIn, U256::from(1_000u64));
        assert_eq!(call.amountOutMin, U256::from(198u64));
    }

    #[test]
    fn test_concentrated_native_out_composes_unwrap() {
        let mock = Arc::new(MockChain::new());
        let path = SwapPath::direct(token(TOKEN), token(MockChain::WRAPPED_NATIVE)).unwrap();
        let intent = intent(TOKEN, NATIVE, 1_000);
        let quote = Quote::new(path, Some(FeeTier::Medium), intent.amount_in, U256::from(500u64), intent.slippage);

        let (_, input) = executor(&mock, RouterKind::Concentrated).build_call(&intent, &quote, MockChain::SIGNER, U256::from(9u64)).unwrap();

        let multicall = ISwapRouter::multicallCall::abi_decode(&input).unwrap();
        assert_eq!(multicall.data.len(), 2);
        let swap = ISwapRouter::exactInputSingleCall::abi_decode(&multicall.data[0]).unwrap();
        assert_eq!(swap.params.recipient, MockChain::ROUTER);
        assert_eq!(swap.params.fee, U24::from(3000u32));
        assert_eq!(swap.params.amountOutMinimum, U256::from(495u64));
        let unwrap = ISwapRouter::unwrapWETH9Call::abi_decode(&multicall.data[1]).unwrap();
        assert_eq!(unwrap.amountMinimum, U256::from(495u64));
        assert_eq!(unwrap.recipient, MockChain::SIGNER);
    }

    #[tokio::test]
    async fn test_insufficient_gas_funds_sends_nothing() {
        let mock = Arc::new(MockChain::new());
        mock.set_native_balance(MockChain::SIGNER, U256::from(1_000u64));
        mock.set_amounts_out(&[MockChain::WRAPPED_NATIVE, TOKEN], U256::from(100u64));
        let path = SwapPath::direct(token(MockChain::WRAPPED_NATIVE), token(TOKEN)).unwrap();
        let intent = intent(NATIVE, TOKEN, 1_000);
        let quote = Quote::new(path, None, intent.amount_in, U256::from(100u64), intent.slippage);

        let err = executor(&mock, RouterKind::Classic).execute(&intent, &quote).await.unwrap_err();

        assert!(matches!(err, SwapError::InsufficientGasFunds { .. }));
        assert!(mock.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_submit_error_keeps_revert_reason() {
        let mock = Arc::new(MockChain::new());
        mock.set_native_balance(MockChain::SIGNER, U256::MAX / U256::from(2u64));
        mock.set_submit_error(Some(RpcCallError::reverted("execution reverted", "UniswapV2Router: EXPIRED")));
        let path = SwapPath::direct(token(MockChain::WRAPPED_NATIVE), token(TOKEN)).unwrap();
        let intent = intent(NATIVE, TOKEN, 1_000);
        let quote = Quote::new(path, None, intent.amount_in, U256::from(100u64), intent.slippage);

        let err = executor(&mock, RouterKind::Classic).execute(&intent, &quote).await.unwrap_err();

        assert!(matches!(err, SwapError::SwapExecutionFailed { tx_hash: None, .. }));
        assert_eq!(err.revert_reason(), Some("UniswapV2Router: EXPIRED"));
    }

    #[tokio::test]
    async fn test_mined_revert_carries_replayed_reason() {
        let mock = Arc::new(MockChain::new());
        mock.set_native_balance(MockChain::SIGNER, U256::MAX / U256::from(2u64));
        // no amounts configured for the path, so the router call fails once mined
        let path = SwapPath::direct(token(MockChain::WRAPPED_NATIVE), token(TOKEN)).unwrap();
        let intent = intent(NATIVE, TOKEN, 1_000);
        let quote = Quote::new(path, None, intent.amount_in, U256::from(100u64), intent.slippage);

        let err = executor(&mock, RouterKind::Classic).execute(&intent, &quote).await.unwrap_err();

        match err {
            SwapError::Reverted { block_number, ref revert_reason, .. } => {
                assert_eq!(block_number, Some(1_001));
                assert_eq!(revert_reason.as_deref(), Some("INSUFFICIENT_LIQUIDITY"));
            }
            other => panic!("expected a revert, got {other:?}"),
        }
        assert_eq!(mock.sent_transactions().len(), 1);
    }
}
