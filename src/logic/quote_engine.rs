use super::types::{Quote, ResolvedRoute, SwapIntent, SwapPath};
use crate::chain::{QuoterClient, RouterClient};
use crate::swap_error::{SwapError, SwapResult};
use crate::utils::RouterKind;
use alloy_primitives::{Address, U256};
use eyre::{Result, WrapErr, eyre};
use std::sync::Arc;
use tracing::{debug, info};

/// Computes the expected output of a trade and its slippage-bounded minimum.
///
/// Classic routers are asked through `getAmountsOut` for each candidate path in priority order
/// and the first path that quotes is taken. Concentrated-liquidity routers are quoted through the
/// quoter contract for the single pool at the resolved fee tier.
pub struct QuoteEngine {
    router_kind: RouterKind,
    router: Arc<dyn RouterClient>,
    quoter: Arc<dyn QuoterClient>,
}

impl QuoteEngine {
    pub fn new(router_kind: RouterKind, router: Arc<dyn RouterClient>, quoter: Arc<dyn QuoterClient>) -> Self {
        Self { router_kind, router, quoter }
    }

    pub async fn quote(&self, intent: &SwapIntent, route: &ResolvedRoute) -> SwapResult<Quote> {
        if route.candidates.is_empty() {
            return Err(SwapError::no_liquidity("route has no candidate path"));
        }

        match self.router_kind {
            RouterKind::Classic => self.quote_classic(intent, route).await,
            RouterKind::Concentrated => self.quote_single_pool(intent, route).await,
        }
    }

    async fn quote_classic(&self, intent: &SwapIntent, route: &ResolvedRoute) -> SwapResult<Quote> {
        let mut failures = Vec::with_capacity(route.candidates.len());

        for path in route.candidates.iter() {
            match self.estimate_path(intent.amount_in, &path.addresses()).await {
                Ok(estimated_out) => {
                    let quote = Quote::new(path.clone(), None, intent.amount_in, estimated_out, intent.slippage);
                    info!("Quoted {} via {}: estimated {}, minimum {}", intent.amount_in, path, estimated_out, quote.min_out);
                    return Ok(quote);
                }
                Err(e) => {
                    debug!("Path {} rejected: {:#}", path, e);
                    failures.push(format!("{path}: {e:#}"));
                }
            }
        }

        Err(SwapError::no_liquidity(failures.join("; ")))
    }

    async fn quote_single_pool(&self, intent: &SwapIntent, route: &ResolvedRoute) -> SwapResult<Quote> {
        let Some(fee_tier) = route.fee_tier else {
            return Err(SwapError::no_liquidity("no fee tier resolved for single pool quote"));
        };
        let path: &SwapPath = &route.candidates[0];
        let token_in = path.first().get_address();
        let token_out = path.last().get_address();

        let estimated_out = self
            .quoter
            .quote_exact_input_single(token_in, token_out, fee_tier.fee(), intent.amount_in)
            .await
            .map_err(|e| SwapError::no_liquidity(format!("quoteExactInputSingle on {path} at fee {fee_tier}: {e}")))?;
        if estimated_out.is_zero() {
            return Err(SwapError::no_liquidity(format!("{path} at fee {fee_tier} quotes zero output")));
        }

        let quote = Quote::new(path.clone(), Some(fee_tier), intent.amount_in, estimated_out, intent.slippage);
        info!("Quoted {} via {} (fee {}): estimated {}, minimum {}", intent.amount_in, path, fee_tier, estimated_out, quote.min_out);
        Ok(quote)
    }

    /// Final-hop output for `path`, failing on an RPC error, a malformed answer or zero output.
    pub async fn estimate_path(&self, amount_in: U256, path: &[Address]) -> Result<U256> {
        let amounts = self.router.get_amounts_out(amount_in, path).await.wrap_err("getAmountsOut")?;
        if amounts.len() != path.len() {
            return Err(eyre!("router returned {} amounts for {} hops", amounts.len(), path.len()));
        }
        match amounts.last() {
            Some(out) if !out.is_zero() => Ok(*out),
            _ => Err(eyre!("zero output")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock_chain::MockChain;
    use crate::logic::path_builder::candidate_paths;
    use crate::logic::types::{FeeTier, Slippage};
    use crate::utils::{Token, TokenWrapper};
    use std::time::Duration;

    fn token(byte: u8) -> TokenWrapper {
        Arc::new(Token::repeat_byte(byte))
    }

    fn intent(from: Address, to: Address, amount: u64) -> SwapIntent {
        SwapIntent::new(from, to, U256::from(amount), Slippage::from_bps(100).unwrap(), Duration::from_secs(600))
    }

    fn engine(kind: RouterKind, mock: &Arc<MockChain>) -> QuoteEngine {
        QuoteEngine::new(kind, mock.clone(), mock.clone())
    }

    #[tokio::test]
    async fn test_classic_prefers_direct_path() {
        let mock = Arc::new(MockChain::new());
        let (a, b, bridge) = (token(1), token(2), token(0xee));
        mock.set_amounts_out(&[a.get_address(), b.get_address()], U256::from(500u64));
        mock.set_amounts_out(&[a.get_address(), bridge.get_address(), b.get_address()], U256::from(700u64));
        let route = ResolvedRoute { candidates: candidate_paths(&a, &b, &bridge), fee_tier: None };

        let quote = engine(RouterKind::Classic, &mock).quote(&intent(a.get_address(), b.get_address(), 10), &route).await.unwrap();

        assert_eq!(quote.path.hops(), 2);
        assert_eq!(quote.estimated_out, U256::from(500u64));
        assert_eq!(quote.min_out, U256::from(495u64));
    }

    #[tokio::test]
    async fn test_classic_falls_back_to_bridge_path() {
        let mock = Arc::new(MockChain::new());
        let (a, b, bridge) = (token(1), token(2), token(0xee));
        mock.set_amounts_out(&[a.get_address(), bridge.get_address(), b.get_address()], U256::from(700u64));
        let route = ResolvedRoute { candidates: candidate_paths(&a, &b, &bridge), fee_tier: None };

        let quote = engine(RouterKind::Classic, &mock).quote(&intent(a.get_address(), b.get_address(), 10), &route).await.unwrap();

        assert_eq!(quote.path.hops(), 3);
        assert_eq!(quote.estimated_out, U256::from(700u64));
    }

    #[tokio::test]
    async fn test_classic_no_path_quotes() {
        let mock = Arc::new(MockChain::new());
        let (a, b, bridge) = (token(1), token(2), token(0xee));
        let route = ResolvedRoute { candidates: candidate_paths(&a, &b, &bridge), fee_tier: None };

        let err = engine(RouterKind::Classic, &mock).quote(&intent(a.get_address(), b.get_address(), 10), &route).await.unwrap_err();

        assert!(matches!(err, SwapError::NoLiquidityPath { .. }));
    }

    #[tokio::test]
    async fn test_single_pool_uses_fee_tier() {
        let mock = Arc::new(MockChain::new());
        let (a, b) = (token(1), token(2));
        mock.set_quote(a.get_address(), b.get_address(), 3000, U256::from(1_000u64));
        let route = ResolvedRoute { candidates: vec![SwapPath::direct(a.clone(), b.clone()).unwrap()], fee_tier: Some(FeeTier::Medium) };

        let quote = engine(RouterKind::Concentrated, &mock).quote(&intent(a.get_address(), b.get_address(), 10), &route).await.unwrap();

        assert_eq!(quote.fee_tier, Some(FeeTier::Medium));
        assert_eq!(quote.min_out, U256::from(990u64));
    }

    #[tokio::test]
    async fn test_single_pool_quoter_revert() {
        let mock = Arc::new(MockChain::new());
        let (a, b) = (token(1), token(2));
        let route = ResolvedRoute { candidates: vec![SwapPath::direct(a.clone(), b.clone()).unwrap()], fee_tier: Some(FeeTier::Low) };

        let err = engine(RouterKind::Concentrated, &mock).quote(&intent(a.get_address(), b.get_address(), 10), &route).await.unwrap_err();

        assert!(matches!(err, SwapError::NoLiquidityPath { .. }));
    }

    #[tokio::test]
    async fn test_estimate_path_errors_keep_their_cause() {
        let mock = Arc::new(MockChain::new());
        let (a, b) = (Address::repeat_byte(1), Address::repeat_byte(2));
        let engine = engine(RouterKind::Classic, &mock);

        let err = engine.estimate_path(U256::from(10u64), &[a, b]).await.unwrap_err();
        assert_eq!(err.to_string(), "getAmountsOut");
        assert!(format!("{err:#}").contains("INSUFFICIENT_LIQUIDITY"));

        mock.set_amounts_out(&[a, b], U256::ZERO);
        let err = engine.estimate_path(U256::from(10u64), &[a, b]).await.unwrap_err();
        assert_eq!(err.to_string(), "zero output");
    }
}
