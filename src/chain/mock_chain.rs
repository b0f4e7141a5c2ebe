use super::clients::{
    ChainClient, Erc20Client, FactoryClient, FeeData, PreparedTransaction, QuoterClient, ReceiptSummary, RouterClient, RpcCallError,
    TxStatus,
};
use super::contracts::{IERC20, ISwapRouter, IUniswapV2Router02};
use alloy_primitives::{Address, B256, U256, address};
use alloy_sol_types::SolInterface;
use async_trait::async_trait;
use dashmap::DashMap;
use eyre::{Result, eyre};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const MOCK_GAS_USED: u64 = 100_000;

/// Read calls that can be made to fail with `MockChain::fail_reads`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MockRead {
    Allowance,
    BalanceOf,
    NativeBalance,
    GetPool,
}

// (calls still allowed to succeed, calls that fail after those)
type ReadFailures = DashMap<MockRead, (usize, usize)>;

fn pair_key(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a <= token_b { (token_a, token_b) } else { (token_b, token_a) }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory chain for tests and benches.
///
/// Reads are served from configured tables. Submitted transactions are decoded with the same
/// `sol!` bindings the executor encodes with and applied to balances and allowances; a swap
/// pays out exactly the configured estimate for its path or pool. A failing transaction only
/// pays gas: balances and allowances are restored to their state before the call, so a
/// `multicall` is all or nothing.
pub struct MockChain {
    fee_data: FeeData,
    native_balances: DashMap<Address, U256>,
    // (token, owner) -> balance
    token_balances: DashMap<(Address, Address), U256>,
    // (token, owner, spender) -> allowance
    allowances: DashMap<(Address, Address, Address), U256>,
    metadata: DashMap<Address, (String, u8)>,
    pools: DashMap<((Address, Address), u32), Address>,
    amounts_out: DashMap<Vec<Address>, U256>,
    quotes: DashMap<(Address, Address, u32), U256>,
    receipts: DashMap<B256, ReceiptSummary>,
    sent: Mutex<Vec<PreparedTransaction>>,
    pool_lookups: Mutex<Vec<u32>>,
    submit_error: Mutex<Option<RpcCallError>>,
    read_failures: ReadFailures,
    last_revert: Mutex<Option<String>>,
    metadata_reads: AtomicUsize,
    allowance_reads: AtomicUsize,
    revert_swaps: AtomicBool,
    revert_approvals: AtomicBool,
    ignore_approvals: AtomicBool,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub const SIGNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    pub const ROUTER: Address = address!("0000000000000000000000000000000000001001");
    pub const FACTORY: Address = address!("0000000000000000000000000000000000001002");
    pub const QUOTER: Address = address!("0000000000000000000000000000000000001003");
    pub const WRAPPED_NATIVE: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

    pub fn new() -> Self {
        Self {
            fee_data: FeeData { max_fee_per_gas: 2_000_000_000, max_priority_fee_per_gas: 1_000_000_000 },
            native_balances: DashMap::new(),
            token_balances: DashMap::new(),
            allowances: DashMap::new(),
            metadata: DashMap::new(),
            pools: DashMap::new(),
            amounts_out: DashMap::new(),
            quotes: DashMap::new(),
            receipts: DashMap::new(),
            sent: Mutex::new(Vec::new()),
            pool_lookups: Mutex::new(Vec::new()),
            submit_error: Mutex::new(None),
            read_failures: DashMap::new(),
            last_revert: Mutex::new(None),
            metadata_reads: AtomicUsize::new(0),
            allowance_reads: AtomicUsize::new(0),
            revert_swaps: AtomicBool::new(false),
            revert_approvals: AtomicBool::new(false),
            ignore_approvals: AtomicBool::new(false),
        }
    }

    pub fn with_fee_data(mut self, fee_data: FeeData) -> Self {
        self.fee_data = fee_data;
        self
    }

    pub fn add_token(&self, token: Address, symbol: &str, decimals: u8) {
        self.metadata.insert(token, (symbol.to_string(), decimals));
    }

    pub fn set_native_balance(&self, owner: Address, balance: U256) {
        self.native_balances.insert(owner, balance);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, balance: U256) {
        self.token_balances.insert((token, owner), balance);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    pub fn add_pool(&self, token_a: Address, token_b: Address, fee: u32) {
        let pool = Address::from_word(alloy_primitives::keccak256([token_a.as_slice(), token_b.as_slice(), &fee.to_be_bytes()[..]].concat()));
        self.pools.insert((pair_key(token_a, token_b), fee), pool);
    }

    /// Final output `getAmountsOut` reports for `path`, and what a swap along it pays.
    pub fn set_amounts_out(&self, path: &[Address], amount_out: U256) {
        self.amounts_out.insert(path.to_vec(), amount_out);
    }

    pub fn set_quote(&self, token_in: Address, token_out: Address, fee: u32, amount_out: U256) {
        self.quotes.insert((token_in, token_out, fee), amount_out);
    }

    pub fn set_revert_swaps(&self, revert: bool) {
        self.revert_swaps.store(revert, Ordering::SeqCst);
    }

    pub fn set_revert_approvals(&self, revert: bool) {
        self.revert_approvals.store(revert, Ordering::SeqCst);
    }

    /// Approvals succeed on-chain but leave the allowance untouched.
    pub fn set_ignore_approvals(&self, ignore: bool) {
        self.ignore_approvals.store(ignore, Ordering::SeqCst);
    }

    pub fn set_submit_error(&self, error: Option<RpcCallError>) {
        *locked(&self.submit_error) = error;
    }

    /// Let the next `succeed` calls of `read` through, then fail the `fail` calls after them.
    pub fn fail_reads(&self, read: MockRead, succeed: usize, fail: usize) {
        self.read_failures.insert(read, (succeed, fail));
    }

    fn check_read(&self, read: MockRead) -> Result<()> {
        let Some(mut entry) = self.read_failures.get_mut(&read) else {
            return Ok(());
        };
        let (succeed, fail) = &mut *entry;
        if *succeed > 0 {
            *succeed -= 1;
            return Ok(());
        }
        if *fail > 0 {
            *fail -= 1;
            return Err(RpcCallError::new(format!("{read:?}: connection reset by peer")).into());
        }
        Ok(())
    }

    pub fn sent_transactions(&self) -> Vec<PreparedTransaction> {
        locked(&self.sent).clone()
    }

    /// Submitted transactions whose target is `to`.
    pub fn sent_to(&self, to: Address) -> Vec<PreparedTransaction> {
        self.sent_transactions().into_iter().filter(|tx| tx.to == to).collect()
    }

    pub fn pool_lookups(&self) -> Vec<u32> {
        locked(&self.pool_lookups).clone()
    }

    pub fn metadata_reads(&self) -> usize {
        self.metadata_reads.load(Ordering::SeqCst)
    }

    pub fn allowance_reads(&self) -> usize {
        self.allowance_reads.load(Ordering::SeqCst)
    }

    pub fn token_balance(&self, token: Address, owner: Address) -> U256 {
        self.token_balances.get(&(token, owner)).map(|b| *b).unwrap_or_default()
    }

    fn native_of(&self, owner: Address) -> U256 {
        self.native_balances.get(&owner).map(|b| *b).unwrap_or_default()
    }

    fn credit_token(&self, token: Address, owner: Address, amount: U256) {
        *self.token_balances.entry((token, owner)).or_default() += amount;
    }

    fn credit_native(&self, owner: Address, amount: U256) {
        *self.native_balances.entry(owner).or_default() += amount;
    }

    fn debit_native(&self, owner: Address, amount: U256) -> Result<(), String> {
        let mut balance = self.native_balances.entry(owner).or_default();
        if *balance < amount {
            return Err("insufficient native balance".to_string());
        }
        *balance -= amount;
        Ok(())
    }

    /// Take `amount` of `token` from `owner` through the router's allowance.
    fn pull_token(&self, token: Address, owner: Address, amount: U256) -> Result<(), String> {
        {
            let mut allowance = self.allowances.entry((token, owner, Self::ROUTER)).or_default();
            if *allowance < amount {
                return Err("TRANSFER_FROM_FAILED: allowance".to_string());
            }
            if *allowance != U256::MAX {
                *allowance -= amount;
            }
        }
        let mut balance = self.token_balances.entry((token, owner)).or_default();
        if *balance < amount {
            return Err("TRANSFER_FROM_FAILED: balance".to_string());
        }
        *balance -= amount;
        Ok(())
    }

    fn path_output(&self, path: &[Address], min_out: U256) -> Result<U256, String> {
        let out = self.amounts_out.get(path).map(|o| *o).ok_or("INSUFFICIENT_LIQUIDITY")?;
        if out < min_out {
            return Err("INSUFFICIENT_OUTPUT_AMOUNT".to_string());
        }
        Ok(out)
    }

    fn apply_classic(&self, from: Address, value: U256, call: IUniswapV2Router02::IUniswapV2Router02Calls) -> Result<(), String> {
        use IUniswapV2Router02::IUniswapV2Router02Calls as Calls;
        match call {
            Calls::swapExactETHForTokens(c) => {
                let out = self.path_output(&c.path, c.amountOutMin)?;
                self.debit_native(from, value)?;
                self.credit_token(*c.path.last().ok_or("empty path")?, c.to, out);
            }
            Calls::swapExactTokensForTokens(c) => {
                let out = self.path_output(&c.path, c.amountOutMin)?;
                self.pull_token(c.path[0], from, c.amountIn)?;
                self.credit_token(*c.path.last().ok_or("empty path")?, c.to, out);
            }
            Calls::swapExactTokensForETH(c) => {
                let out = self.path_output(&c.path, c.amountOutMin)?;
                self.pull_token(c.path[0], from, c.amountIn)?;
                self.credit_native(c.to, out);
            }
            _ => return Err("unsupported router call".to_string()),
        }
        Ok(())
    }

    fn apply_concentrated(&self, from: Address, value: U256, call: ISwapRouter::ISwapRouterCalls) -> Result<(), String> {
        use ISwapRouter::ISwapRouterCalls as Calls;
        match call {
            Calls::exactInputSingle(c) => {
                let p = c.params;
                let out = self.quotes.get(&(p.tokenIn, p.tokenOut, p.fee.to::<u32>())).map(|o| *o).ok_or("no pool")?;
                if out < p.amountOutMinimum {
                    return Err("Too little received".to_string());
                }
                if value.is_zero() {
                    self.pull_token(p.tokenIn, from, p.amountIn)?;
                } else {
                    if value != p.amountIn || p.tokenIn != Self::WRAPPED_NATIVE {
                        return Err("value mismatch".to_string());
                    }
                    self.debit_native(from, value)?;
                }
                self.credit_token(p.tokenOut, p.recipient, out);
            }
            Calls::unwrapWETH9(c) => {
                let held = self.token_balance(Self::WRAPPED_NATIVE, Self::ROUTER);
                if held < c.amountMinimum {
                    return Err("Insufficient WETH9".to_string());
                }
                self.token_balances.insert((Self::WRAPPED_NATIVE, Self::ROUTER), U256::ZERO);
                self.credit_native(c.recipient, held);
            }
            Calls::multicall(c) => {
                for inner in c.data.iter() {
                    let inner = ISwapRouter::ISwapRouterCalls::abi_decode(inner).map_err(|e| e.to_string())?;
                    self.apply_concentrated(from, value, inner)?;
                }
            }
            _ => return Err("unsupported router call".to_string()),
        }
        Ok(())
    }

    fn apply_token_call(&self, from: Address, token: Address, call: IERC20::IERC20Calls) -> Result<(), String> {
        match call {
            IERC20::IERC20Calls::approve(c) => {
                if self.revert_approvals.load(Ordering::SeqCst) {
                    return Err("approve reverted".to_string());
                }
                if !self.ignore_approvals.load(Ordering::SeqCst) {
                    self.allowances.insert((token, from, c.spender), c.amount);
                }
                Ok(())
            }
            _ => Err("unsupported token call".to_string()),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            native_balances: self.native_balances.clone(),
            token_balances: self.token_balances.clone(),
            allowances: self.allowances.clone(),
        }
    }

    fn restore(&self, snapshot: Snapshot) {
        restore_map(&self.native_balances, snapshot.native_balances);
        restore_map(&self.token_balances, snapshot.token_balances);
        restore_map(&self.allowances, snapshot.allowances);
    }

    /// Apply `tx` atomically: on failure every balance and allowance change is rolled back.
    fn apply_atomic(&self, from: Address, tx: &PreparedTransaction) -> Result<(), String> {
        let snapshot = self.snapshot();
        let result = self.apply(from, tx);
        if result.is_err() {
            self.restore(snapshot);
        }
        result
    }

    fn apply(&self, from: Address, tx: &PreparedTransaction) -> Result<(), String> {
        if tx.to == Self::ROUTER {
            if self.revert_swaps.load(Ordering::SeqCst) {
                return Err("swap reverted".to_string());
            }
            if let Ok(call) = IUniswapV2Router02::IUniswapV2Router02Calls::abi_decode(&tx.input) {
                return self.apply_classic(from, tx.value, call);
            }
            let call = ISwapRouter::ISwapRouterCalls::abi_decode(&tx.input).map_err(|e| e.to_string())?;
            return self.apply_concentrated(from, tx.value, call);
        }
        let call = IERC20::IERC20Calls::abi_decode(&tx.input).map_err(|e| e.to_string())?;
        self.apply_token_call(from, tx.to, call)
    }
}

struct Snapshot {
    native_balances: DashMap<Address, U256>,
    token_balances: DashMap<(Address, Address), U256>,
    allowances: DashMap<(Address, Address, Address), U256>,
}

fn restore_map<K: Eq + std::hash::Hash, V>(target: &DashMap<K, V>, saved: DashMap<K, V>) {
    target.clear();
    for (key, value) in saved {
        target.insert(key, value);
    }
}

#[async_trait]
impl Erc20Client for MockChain {
    async fn symbol(&self, token: Address) -> Result<String> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);
        self.metadata.get(&token).map(|m| m.0.clone()).ok_or_else(|| eyre!("execution reverted"))
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);
        self.metadata.get(&token).map(|m| m.1).ok_or_else(|| eyre!("execution reverted"))
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        self.check_read(MockRead::BalanceOf)?;
        Ok(self.token_balance(token, owner))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.allowance_reads.fetch_add(1, Ordering::SeqCst);
        self.check_read(MockRead::Allowance)?;
        Ok(self.allowances.get(&(token, owner, spender)).map(|a| *a).unwrap_or_default())
    }
}

#[async_trait]
impl RouterClient for MockChain {
    async fn get_amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>> {
        let out = self.amounts_out.get(path).map(|o| *o).ok_or_else(|| eyre!("execution reverted: INSUFFICIENT_LIQUIDITY"))?;
        let mut amounts = vec![amount_in; path.len()];
        if let Some(last) = amounts.last_mut() {
            *last = out;
        }
        Ok(amounts)
    }

    async fn factory(&self) -> Result<Address> {
        Ok(Self::FACTORY)
    }
}

#[async_trait]
impl FactoryClient for MockChain {
    async fn get_pool(&self, token_a: Address, token_b: Address, fee: u32) -> Result<Address> {
        locked(&self.pool_lookups).push(fee);
        self.check_read(MockRead::GetPool)?;
        Ok(self.pools.get(&(pair_key(token_a, token_b), fee)).map(|p| *p).unwrap_or(Address::ZERO))
    }
}

#[async_trait]
impl QuoterClient for MockChain {
    async fn quote_exact_input_single(&self, token_in: Address, token_out: Address, fee: u32, _amount_in: U256) -> Result<U256> {
        self.quotes.get(&(token_in, token_out, fee)).map(|q| *q).ok_or_else(|| eyre!("execution reverted: SPL"))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn signer_address(&self) -> Address {
        Self::SIGNER
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(1267)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.check_read(MockRead::NativeBalance)?;
        Ok(self.native_of(owner))
    }

    async fn fee_data(&self) -> Result<FeeData> {
        Ok(self.fee_data)
    }

    async fn submit(&self, tx: PreparedTransaction) -> Result<B256> {
        if let Some(error) = locked(&self.submit_error).clone() {
            return Err(error.into());
        }

        let index = {
            let mut sent = locked(&self.sent);
            sent.push(tx.clone());
            sent.len()
        };
        let tx_hash = B256::from(U256::from(index));

        let from = Self::SIGNER;
        let fee = U256::from(MOCK_GAS_USED) * U256::from(tx.max_fee_per_gas);
        let status = match self.debit_native(from, fee).and_then(|_| self.apply_atomic(from, &tx)) {
            Ok(()) => TxStatus::Success,
            Err(reason) => {
                *locked(&self.last_revert) = Some(reason);
                TxStatus::Reverted
            }
        };

        self.receipts.insert(
            tx_hash,
            ReceiptSummary {
                tx_hash,
                status,
                block_number: Some(1_000 + index as u64),
                gas_used: MOCK_GAS_USED,
                effective_gas_price: tx.max_fee_per_gas,
            },
        );
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256, _timeout: Duration) -> Result<ReceiptSummary> {
        self.receipts.get(&tx_hash).map(|r| r.clone()).ok_or_else(|| eyre!("unknown transaction {tx_hash}"))
    }

    /// Reports the reason of the most recent reverted transaction.
    async fn replay(&self, _tx: &PreparedTransaction, _block_number: Option<u64>) -> Result<()> {
        match locked(&self.last_revert).clone() {
            Some(reason) => Err(RpcCallError::reverted("execution reverted", reason).into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolCall;

    #[tokio::test]
    async fn test_failed_multicall_leaves_no_partial_state() {
        let mock = MockChain::new();
        let token = Address::repeat_byte(0xa1);
        mock.set_native_balance(MockChain::SIGNER, U256::from(10u64).pow(U256::from(18u64)));
        mock.set_token_balance(token, MockChain::SIGNER, U256::from(1_000u64));
        mock.set_allowance(token, MockChain::SIGNER, MockChain::ROUTER, U256::from(1_000u64));
        mock.set_quote(token, MockChain::WRAPPED_NATIVE, 500, U256::from(50u64));

        let params = ISwapRouter::ExactInputSingleParams {
            tokenIn: token,
            tokenOut: MockChain::WRAPPED_NATIVE,
            fee: alloy_primitives::aliases::U24::from(500u32),
            recipient: MockChain::ROUTER,
            deadline: U256::MAX,
            amountIn: U256::from(1_000u64),
            amountOutMinimum: U256::ZERO,
            sqrtPriceLimitX96: alloy_primitives::aliases::U160::ZERO,
        };
        let swap = ISwapRouter::exactInputSingleCall { params }.abi_encode();
        // unwrap demands more than the swap pays, so the second call fails
        let unwrap = ISwapRouter::unwrapWETH9Call { amountMinimum: U256::from(60u64), recipient: MockChain::SIGNER }.abi_encode();
        let input = ISwapRouter::multicallCall { data: vec![swap.into(), unwrap.into()] }.abi_encode();
        let tx = PreparedTransaction {
            to: MockChain::ROUTER,
            value: U256::ZERO,
            input: input.into(),
            gas_limit: 300_000,
            max_fee_per_gas: 1,
            max_priority_fee_per_gas: 1,
        };

        let hash = mock.submit(tx.clone()).await.unwrap();
        let receipt = mock.wait_for_receipt(hash, Duration::from_secs(1)).await.unwrap();

        assert_eq!(receipt.status, TxStatus::Reverted);
        assert_eq!(mock.token_balance(token, MockChain::SIGNER), U256::from(1_000u64));
        assert_eq!(mock.token_balance(MockChain::WRAPPED_NATIVE, MockChain::ROUTER), U256::ZERO);
        let err = mock.replay(&tx, receipt.block_number).await.unwrap_err();
        assert_eq!(RpcCallError::revert_reason_of(&err).as_deref(), Some("Insufficient WETH9"));
    }

    #[tokio::test]
    async fn test_read_failures_are_counted() {
        let mock = MockChain::new();
        let token = Address::repeat_byte(0xa1);
        mock.fail_reads(MockRead::BalanceOf, 1, 1);

        assert!(mock.balance_of(token, MockChain::SIGNER).await.is_ok());
        assert!(mock.balance_of(token, MockChain::SIGNER).await.is_err());
        assert!(mock.balance_of(token, MockChain::SIGNER).await.is_ok());
    }
}
