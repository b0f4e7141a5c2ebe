use super::clients::{
    ChainClient, Erc20Client, FactoryClient, FeeData, PreparedTransaction, QuoterClient, ReceiptSummary, RouterClient, RpcCallError,
    TxStatus,
};
use super::contracts::{IERC20, IQuoter, ISwapRouter, IUniswapV2Router02, IUniswapV3Factory};
use crate::utils::RouterKind;
use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::aliases::{U160, U24};
use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::{BlockId, TransactionReceipt, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, decode_revert_reason};
use alloy_transport::TransportError;
use async_trait::async_trait;
use eyre::{Result, WrapErr, eyre};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Addresses of the contracts the backend talks to.
#[derive(Clone, Debug)]
pub struct ContractAddresses {
    pub router: Address,
    pub router_kind: RouterKind,
    pub factory: Option<Address>,
    pub quoter: Option<Address>,
}

/// JSON-RPC backend: read calls through `eth_call`, writes signed by a local private key.
pub struct RpcChain {
    provider: DynProvider,
    signer: Address,
    contracts: ContractAddresses,
}

pub fn parse_private_key(raw: &str) -> Result<PrivateKeySigner> {
    let key = raw.trim();
    if !key.starts_with("0x") || key.len() != 66 {
        return Err(eyre!("PRIVATE_KEY must be 0x followed by 64 hex characters"));
    }
    PrivateKeySigner::from_str(key).map_err(|e| eyre!("invalid PRIVATE_KEY: {e}"))
}

fn rpc_error(error: TransportError) -> RpcCallError {
    let revert_reason = error
        .as_error_resp()
        .and_then(|payload| payload.as_revert_data())
        .and_then(|data| decode_revert_reason(&data));
    RpcCallError { message: error.to_string(), revert_reason }
}

impl RpcChain {
    pub async fn connect(rpc_url: &str, signer: PrivateKeySigner, contracts: ContractAddresses) -> Result<Self> {
        let signer_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(rpc_url)
            .await
            .wrap_err_with(|| format!("connect to {rpc_url}"))?
            .erased();

        let mut chain = Self { provider, signer: signer_address, contracts };
        chain.discover_factory().await?;
        Ok(chain)
    }

    /// Concentrated-liquidity mode needs the pool factory. Ask the router when none is configured.
    async fn discover_factory(&mut self) -> Result<()> {
        if self.contracts.factory.is_some() || self.contracts.router_kind != RouterKind::Concentrated {
            return Ok(());
        }
        let factory = self.factory().await.wrap_err("router.factory()")?;
        info!("Discovered pool factory {} from router {}", factory, self.contracts.router);
        self.contracts.factory = Some(factory);
        Ok(())
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    async fn eth_call(&self, to: Address, input: Vec<u8>) -> Result<Bytes> {
        let request = TransactionRequest::default().with_to(to).with_input(input);
        let output = self.provider.call(request).await.map_err(rpc_error)?;
        Ok(output)
    }

    fn factory_address(&self) -> Result<Address> {
        self.contracts.factory.ok_or_else(|| eyre!("pool factory address is not configured"))
    }

    fn quoter_address(&self) -> Result<Address> {
        self.contracts.quoter.ok_or_else(|| eyre!("quoter address is not configured"))
    }
}

fn summarize_receipt(receipt: &TransactionReceipt) -> ReceiptSummary {
    ReceiptSummary {
        tx_hash: receipt.transaction_hash,
        status: if receipt.status() { TxStatus::Success } else { TxStatus::Reverted },
        block_number: receipt.block_number,
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
    }
}

#[async_trait]
impl Erc20Client for RpcChain {
    async fn symbol(&self, token: Address) -> Result<String> {
        let out = self.eth_call(token, IERC20::symbolCall {}.abi_encode()).await?;
        Ok(IERC20::symbolCall::abi_decode_returns(&out)?)
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        let out = self.eth_call(token, IERC20::decimalsCall {}.abi_encode()).await?;
        Ok(IERC20::decimalsCall::abi_decode_returns(&out)?)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let out = self.eth_call(token, IERC20::balanceOfCall { owner }.abi_encode()).await?;
        Ok(IERC20::balanceOfCall::abi_decode_returns(&out)?)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let out = self.eth_call(token, IERC20::allowanceCall { owner, spender }.abi_encode()).await?;
        Ok(IERC20::allowanceCall::abi_decode_returns(&out)?)
    }
}

#[async_trait]
impl RouterClient for RpcChain {
    async fn get_amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>> {
        let call = IUniswapV2Router02::getAmountsOutCall { amountIn: amount_in, path: path.to_vec() };
        let out = self.eth_call(self.contracts.router, call.abi_encode()).await?;
        Ok(IUniswapV2Router02::getAmountsOutCall::abi_decode_returns(&out)?)
    }

    async fn factory(&self) -> Result<Address> {
        let out = match self.contracts.router_kind {
            RouterKind::Classic => {
                let out = self.eth_call(self.contracts.router, IUniswapV2Router02::factoryCall {}.abi_encode()).await?;
                IUniswapV2Router02::factoryCall::abi_decode_returns(&out)?
            }
            RouterKind::Concentrated => {
                let out = self.eth_call(self.contracts.router, ISwapRouter::factoryCall {}.abi_encode()).await?;
                ISwapRouter::factoryCall::abi_decode_returns(&out)?
            }
        };
        Ok(out)
    }
}

#[async_trait]
impl FactoryClient for RpcChain {
    async fn get_pool(&self, token_a: Address, token_b: Address, fee: u32) -> Result<Address> {
        let call = IUniswapV3Factory::getPoolCall { tokenA: token_a, tokenB: token_b, fee: U24::from(fee) };
        let out = self.eth_call(self.factory_address()?, call.abi_encode()).await?;
        Ok(IUniswapV3Factory::getPoolCall::abi_decode_returns(&out)?)
    }
}

#[async_trait]
impl QuoterClient for RpcChain {
    async fn quote_exact_input_single(&self, token_in: Address, token_out: Address, fee: u32, amount_in: U256) -> Result<U256> {
        let call = IQuoter::quoteExactInputSingleCall {
            tokenIn: token_in,
            tokenOut: token_out,
            fee: U24::from(fee),
            amountIn: amount_in,
            sqrtPriceLimitX96: U160::ZERO,
        };
        let out = self.eth_call(self.quoter_address()?, call.abi_encode()).await?;
        Ok(IQuoter::quoteExactInputSingleCall::abi_decode_returns(&out)?)
    }
}

#[async_trait]
impl ChainClient for RpcChain {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await.map_err(rpc_error)?)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        Ok(self.provider.get_balance(owner).await.map_err(rpc_error)?)
    }

    async fn fee_data(&self) -> Result<FeeData> {
        let estimate = self.provider.estimate_eip1559_fees().await.map_err(rpc_error)?;
        Ok(FeeData {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn submit(&self, tx: PreparedTransaction) -> Result<B256> {
        let request = TransactionRequest::default()
            .with_from(self.signer)
            .with_to(tx.to)
            .with_value(tx.value)
            .with_input(tx.input)
            .with_gas_limit(tx.gas_limit)
            .with_max_fee_per_gas(tx.max_fee_per_gas)
            .with_max_priority_fee_per_gas(tx.max_priority_fee_per_gas);

        let pending = self.provider.send_transaction(request).await.map_err(rpc_error)?;
        let tx_hash = *pending.tx_hash();
        debug!("Broadcast transaction {}", tx_hash);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256, timeout: Duration) -> Result<ReceiptSummary> {
        let started = Instant::now();
        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await.map_err(rpc_error)? {
                return Ok(summarize_receipt(&receipt));
            }
            if started.elapsed() > timeout {
                return Err(eyre!("timed out after {:?} waiting for receipt of {}", timeout, tx_hash));
            }
            sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    async fn replay(&self, tx: &PreparedTransaction, block_number: Option<u64>) -> Result<()> {
        let request = TransactionRequest::default()
            .with_from(self.signer)
            .with_to(tx.to)
            .with_value(tx.value)
            .with_input(tx.input.clone())
            .with_gas_limit(tx.gas_limit);
        // state at the end of the parent block is the closest a call can get to the mined position
        let block = match block_number {
            Some(number) => BlockId::number(number.saturating_sub(1)),
            None => BlockId::latest(),
        };
        self.provider.call(request).block(block).await.map_err(rpc_error)?;
        Ok(())
    }
}
