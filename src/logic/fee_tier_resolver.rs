use super::types::FeeTier;
use crate::chain::{FactoryClient, RpcCallError};
use alloy_primitives::Address;
use dashmap::DashMap;
use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

/// Finds the cheapest fee tier that has a deployed pool for a token pair.
///
/// Outside a session every call asks the factory. Between `begin_session` and `end_session`
/// (one batch) each pair is looked up at most once. Only conclusive answers are remembered: a
/// failed `getPool` is returned as an error and the next call asks again.
pub struct FeeTierResolver {
    factory: Arc<dyn FactoryClient>,
    session_open: AtomicBool,
    session_cache: DashMap<(Address, Address), Option<FeeTier>>,
}

fn pair_key(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a <= token_b { (token_a, token_b) } else { (token_b, token_a) }
}

impl FeeTierResolver {
    pub fn new(factory: Arc<dyn FactoryClient>) -> Self {
        Self { factory, session_open: AtomicBool::new(false), session_cache: DashMap::new() }
    }

    pub fn begin_session(&self) {
        self.session_cache.clear();
        self.session_open.store(true, Ordering::SeqCst);
    }

    pub fn end_session(&self) {
        self.session_open.store(false, Ordering::SeqCst);
        self.session_cache.clear();
    }

    fn in_session(&self) -> bool {
        self.session_open.load(Ordering::SeqCst)
    }

    /// First tier, in ascending fee order, whose pool address is non-zero. `Ok(None)` means every
    /// tier answered with the zero address, so the pair has no pool. `Err` means some tier could
    /// not be read and nothing is known.
    pub async fn find_fee_tier(&self, token_a: Address, token_b: Address) -> Result<Option<FeeTier>> {
        let key = pair_key(token_a, token_b);
        if self.in_session() {
            if let Some(hit) = self.session_cache.get(&key) {
                return Ok(*hit);
            }
        }

        let tier = self.lookup(token_a, token_b).await?;

        if self.in_session() {
            self.session_cache.insert(key, tier);
        }
        Ok(tier)
    }

    async fn lookup(&self, token_a: Address, token_b: Address) -> Result<Option<FeeTier>> {
        for tier in FeeTier::iter() {
            let pool = self.factory.get_pool(token_a, token_b, tier.fee()).await.inspect_err(|e| {
                warn!("getPool({}, {}, {}) failed: {} (revert: {:?})", token_a, token_b, tier, e, RpcCallError::revert_reason_of(e))
            });
            let pool = pool.wrap_err_with(|| format!("getPool at fee {tier}"))?;
            if !pool.is_zero() {
                debug!("Pool {} found for {}/{} at fee {}", pool, token_a, token_b, tier);
                return Ok(Some(tier));
            }
            debug!("No pool for {}/{} at fee {}", token_a, token_b, tier);
        }
        Ok(None)
    }
}
