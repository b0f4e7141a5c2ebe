use super::allowance::AllowanceManager;
use super::balance::BalanceVerifier;
use super::gas::GasPolicy;
use super::transaction_executor::SwapExecutor;
use super::types::{ApprovalOutcome, BatchReport, SwapState, TradeReport, TransactionResult};
use crate::chain::{ChainClient, SwapBackend, TokenMetadataCache};
use crate::logic::{FeeTier, FeeTierResolver, Quote, QuoteEngine, ResolvedRoute, Slippage, SwapIntent, SwapPath, candidate_paths, single_pool_path};
use crate::swap_error::{SwapError, SwapResult};
use crate::utils::constants::NATIVE;
use crate::utils::{RouterKind, SwapConfig, SwapRequest, TokenWrapper};
use alloy_primitives::{Address, I256, U256};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Stages walked so far by one trade. Turned into a `TradeReport` once a terminal state is hit.
struct TradeProgress {
    states: Vec<SwapState>,
    quote: Option<Quote>,
    approval: Option<ApprovalOutcome>,
    warnings: Vec<SwapError>,
}

impl TradeProgress {
    fn new() -> Self {
        Self { states: vec![SwapState::Idle], quote: None, approval: None, warnings: Vec::new() }
    }

    fn advance(&mut self, state: SwapState) {
        self.states.push(state);
    }
}

/// Runs swap intents through route resolution, quoting, approval, execution and verification.
///
/// Each trade has its own state machine. A batch runs its trades strictly one after another since
/// they share the signer's nonce sequence.
pub struct SwapOrchestrator {
    config: SwapConfig,
    chain: Arc<dyn ChainClient>,
    metadata: TokenMetadataCache,
    fee_tiers: FeeTierResolver,
    quotes: QuoteEngine,
    allowances: AllowanceManager,
    executor: SwapExecutor,
    verifier: BalanceVerifier,
}

impl SwapOrchestrator {
    pub fn new<B: SwapBackend + 'static>(config: SwapConfig, backend: Arc<B>) -> Self {
        let gas = GasPolicy::new(config.gas_limit, config.fee_headroom_percent);
        let metadata =
            TokenMetadataCache::new(backend.clone(), config.wrapped_native, &config.native_symbol, &config.wrapped_native_symbol());
        let fee_tiers = FeeTierResolver::new(backend.clone());
        let quotes = QuoteEngine::new(config.router_kind, backend.clone(), backend.clone());
        let allowances =
            AllowanceManager::new(backend.clone(), backend.clone(), gas, config.approval_policy, config.receipt_timeout());
        let executor = SwapExecutor::new(backend.clone(), gas, config.router_kind, config.router, config.receipt_timeout());
        let verifier = BalanceVerifier::new(backend.clone(), backend.clone());

        if config.best_effort_quotes {
            warn!("Best effort quotes enabled: trades whose quote fails are sent with no minimum output");
        }

        Self { config, chain: backend, metadata, fee_tiers, quotes, allowances, executor, verifier }
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn metadata(&self) -> &TokenMetadataCache {
        &self.metadata
    }

    /// Turn a config entry into an intent, parsing the amount with the source token's decimals.
    pub async fn intent_from_request(&self, request: &SwapRequest) -> Result<SwapIntent> {
        let from = request.from_address()?;
        let to = request.to_address()?;
        let token = self.metadata.resolve(from).await;
        if token.is_degraded() {
            return Err(eyre::eyre!("metadata of {from} is unreadable, refusing to scale amount {} with guessed decimals", request.amount));
        }
        let amount_in = token.parse_amount(&request.amount)?;
        if amount_in.is_zero() {
            return Err(eyre::eyre!("amount for {} -> {} must be positive", request.from, request.to));
        }
        let slippage = Slippage::from_bps(request.slippage_bps.unwrap_or(self.config.slippage_bps))?;
        Ok(SwapIntent::new(from, to, amount_in, slippage, self.config.deadline_offset()))
    }

    /// Native assets stand in for their wrapped token inside paths and pools.
    fn on_chain_token(&self, token: &TokenWrapper) -> TokenWrapper {
        if token.is_native() { self.metadata.wrapped_native() } else { token.clone() }
    }

    async fn resolve_token(&self, address: Address, progress: &mut TradeProgress) -> TokenWrapper {
        let token = self.metadata.resolve(address).await;
        if token.is_degraded() {
            progress.warnings.push(SwapError::MetadataDegraded {
                token: address,
                reason: "symbol/decimals unreadable, placeholder in use".to_string(),
            });
        }
        token
    }

    async fn resolve_route(&self, from: &TokenWrapper, to: &TokenWrapper) -> SwapResult<ResolvedRoute> {
        let no_route = || SwapError::NoRoute { from: from.get_address(), to: to.get_address() };
        let (path_from, path_to) = (self.on_chain_token(from), self.on_chain_token(to));

        match self.config.router_kind {
            RouterKind::Classic => {
                let candidates = candidate_paths(&path_from, &path_to, &self.metadata.wrapped_native());
                if candidates.is_empty() {
                    return Err(no_route());
                }
                Ok(ResolvedRoute { candidates, fee_tier: None })
            }
            RouterKind::Concentrated => {
                let path = single_pool_path(&path_from, &path_to).map_err(|_| no_route())?;
                let fee_tier = self.find_fee_tier(path_from.get_address(), path_to.get_address()).await?.ok_or_else(no_route)?;
                Ok(ResolvedRoute { candidates: vec![path], fee_tier: Some(fee_tier) })
            }
        }
    }

    /// A pool lookup that could not be read fails the trade as unquotable rather than routeless.
    async fn find_fee_tier(&self, token_a: Address, token_b: Address) -> SwapResult<Option<FeeTier>> {
        self.fee_tiers.find_fee_tier(token_a, token_b).await.map_err(|e| SwapError::no_liquidity(format!("{e:#}")))
    }

    async fn quote(&self, intent: &SwapIntent, route: &ResolvedRoute) -> SwapResult<Quote> {
        match self.quotes.quote(intent, route).await {
            Ok(quote) => Ok(quote),
            Err(SwapError::NoLiquidityPath { reason }) if self.config.best_effort_quotes => {
                let path = route.primary().cloned().ok_or_else(|| SwapError::no_liquidity(reason.clone()))?;
                warn!("Quote failed ({}); sending {} with zero minimum output", reason, path);
                Ok(Quote::unprotected(path, route.fee_tier, intent.amount_in))
            }
            Err(e) => Err(e),
        }
    }

    /// Walk one trade to a terminal state. Never fails: every error is recorded in the report.
    pub async fn run_intent(&self, intent: SwapIntent) -> TradeReport {
        let mut progress = TradeProgress::new();
        let outcome = self.drive(&intent, &mut progress).await;

        match &outcome {
            Ok(result) => {
                info!("Trade confirmed in block {:?}: {}", result.block_number, result.tx_hash);
                progress.advance(SwapState::Confirmed);
            }
            Err(e) => {
                if matches!(e, SwapError::SwapExecutionFailed { tx_hash: Some(_), .. } | SwapError::Reverted { .. }) {
                    progress.advance(SwapState::Submitted);
                }
                error!("Trade {} -> {} failed [{}]: {} (revert: {})", intent.from, intent.to, e.kind(), e, e.revert_reason().unwrap_or("none"));
                progress.advance(SwapState::Failed(e.kind()));
            }
        }

        TradeReport {
            intent,
            states: progress.states,
            quote: progress.quote,
            approval: progress.approval,
            outcome,
            warnings: progress.warnings,
        }
    }

    async fn drive(&self, intent: &SwapIntent, progress: &mut TradeProgress) -> SwapResult<TransactionResult> {
        let trader = self.chain.signer_address();
        let from = self.resolve_token(intent.from, progress).await;
        let to = self.resolve_token(intent.to, progress).await;
        info!("Swapping {} {} -> {}", from.format_amount(intent.amount_in), from, to);

        let route = self.resolve_route(&from, &to).await?;
        progress.advance(SwapState::RouteResolved);

        let quote = self.quote(intent, &route).await?;
        progress.quote = Some(quote.clone());
        progress.advance(SwapState::Quoted);

        if intent.requires_allowance() {
            let approval = self.allowances.ensure_allowance(trader, self.config.router, intent.from, intent.amount_in).await?;
            progress.approval = Some(approval);
            progress.advance(SwapState::Approved);
        }

        let before = self.verifier.balance_of(trader, intent.to).await?;
        let receipt = self.executor.execute(intent, &quote).await?;
        progress.advance(SwapState::Submitted);

        // the swap is mined from here on; a failed read-back only loses the measurement
        let actual_out = match self.measure_output(trader, intent, before, receipt.fee_paid()).await {
            Ok(amount) => {
                info!("Received {} {}", to.format_signed_amount(amount), to);
                Some(amount)
            }
            Err(e) => {
                warn!("Swap {} confirmed but the received amount is unknown: {}", receipt.tx_hash, e);
                progress.warnings.push(SwapError::BalanceUnverified { token: intent.to, reason: e.to_string() });
                None
            }
        };

        Ok(TransactionResult::new(&receipt, actual_out))
    }

    async fn measure_output(&self, trader: Address, intent: &SwapIntent, before: U256, fee_paid: U256) -> SwapResult<I256> {
        let delta = self.verifier.verify(trader, intent.to, before).await?;
        if intent.to != NATIVE {
            return Ok(delta);
        }
        // the swap's own gas came out of the measured balance
        let fee = I256::try_from(fee_paid).wrap_err("fee paid out of range")?;
        delta.checked_add(fee).ok_or_else(|| SwapError::Internal(eyre::eyre!("received amount out of range")))
    }

    /// Run `intents` in order, pausing between trades. A failed trade never stops the batch.
    pub async fn run_batch(&self, intents: Vec<SwapIntent>) -> BatchReport {
        self.fee_tiers.begin_session();
        let total = intents.len();
        let mut report = BatchReport::default();

        for (index, intent) in intents.into_iter().enumerate() {
            if index > 0 && !self.config.inter_trade_delay().is_zero() {
                tokio::time::sleep(self.config.inter_trade_delay()).await;
            }
            info!("Trade {}/{}", index + 1, total);
            report.trades.push(self.run_intent(intent).await);
        }

        self.fee_tiers.end_session();

        info!("Batch finished: {} confirmed, {} failed", report.confirmed(), report.failed());
        for trade in report.trades.iter() {
            if let Err(e) = &trade.outcome {
                info!("  {} -> {}: {} {}", trade.intent.from, trade.intent.to, e.kind(), e);
            }
        }
        report
    }

    /// Log the signer's native balance and the balance of every token the intents touch.
    pub async fn log_balances(&self, intents: &[SwapIntent]) -> SwapResult<Vec<(TokenWrapper, U256)>> {
        let trader = self.chain.signer_address();
        let mut assets = vec![NATIVE];
        for intent in intents.iter() {
            for address in [intent.from, intent.to] {
                if !assets.contains(&address) {
                    assets.push(address);
                }
            }
        }

        let mut balances = Vec::with_capacity(assets.len());
        for address in assets {
            let token = self.metadata.resolve(address).await;
            let balance = self.verifier.balance_of(trader, address).await?;
            info!("Balance of {}: {} {}", trader, token.format_amount(balance), token);
            balances.push((token, balance));
        }
        Ok(balances)
    }

    /// Quote `amount_in` along `path` without sending anything.
    pub async fn check_path(&self, path: &[Address], amount_in: U256) -> SwapResult<Quote> {
        let mut tokens = Vec::with_capacity(path.len());
        for address in path.iter() {
            let token = self.metadata.resolve(*address).await;
            tokens.push(self.on_chain_token(&token));
        }
        let swap_path = SwapPath::new(tokens).map_err(|e| SwapError::no_liquidity(e.to_string()))?;
        let (from, to) = (swap_path.first().get_address(), swap_path.last().get_address());

        let fee_tier = match self.config.router_kind {
            RouterKind::Classic => None,
            RouterKind::Concentrated => {
                if swap_path.hops() != 2 {
                    return Err(SwapError::no_liquidity("single pool router takes a two token path"));
                }
                Some(self.find_fee_tier(from, to).await?.ok_or(SwapError::NoRoute { from, to })?)
            }
        };

        let slippage = Slippage::from_bps(self.config.slippage_bps)?;
        let intent = SwapIntent::new(from, to, amount_in, slippage, self.config.deadline_offset());
        let quote = self.quotes.quote(&intent, &ResolvedRoute { candidates: vec![swap_path], fee_tier }).await?;
        info!("Path {} is valid: {} in, estimated {} out", quote.path, amount_in, quote.estimated_out);
        Ok(quote)
    }
}
