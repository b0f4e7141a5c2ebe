use crate::utils::TokenWrapper;
use crate::utils::constants::{BPS_DENOMINATOR, NATIVE};
use alloy_primitives::{Address, U256};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;
use strum_macros::EnumIter;

/// Pool fee identifier of a concentrated-liquidity pool, in hundredths of a basis point.
///
/// Declaration order is the lookup priority (ascending fee).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Serialize, Deserialize)]
pub enum FeeTier {
    Low,
    Medium,
    High,
}

impl FeeTier {
    pub fn fee(&self) -> u32 {
        match self {
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10000,
        }
    }

    pub fn from_fee(fee: u32) -> Option<FeeTier> {
        match fee {
            500 => Some(FeeTier::Low),
            3000 => Some(FeeTier::Medium),
            10000 => Some(FeeTier::High),
            _ => None,
        }
    }
}

impl Display for FeeTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fee())
    }
}

// binary fractions like 0.07 scale to 699.9999999999999, so allow float noise but not sub-bps input
fn whole_bps(scaled: f64) -> Result<u32> {
    let rounded = scaled.round();
    if (scaled - rounded).abs() > 1e-6 {
        return Err(eyre!("slippage must be a whole number of basis points, got {scaled} bps"));
    }
    Ok(rounded as u32)
}

/// Tolerated shortfall between estimated and guaranteed output, in basis points. Always in (0, 1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slippage(u32);

impl Slippage {
    pub fn from_bps(bps: u32) -> Result<Self> {
        if bps == 0 || bps >= BPS_DENOMINATOR {
            return Err(eyre!("slippage must be between 0 and 100% exclusive, got {bps} bps"));
        }
        Ok(Slippage(bps))
    }

    /// `0.01` is one percent. Must be a whole number of basis points: `0.00015` is rejected
    /// rather than silently turned into 2 bps.
    pub fn from_fraction(fraction: f64) -> Result<Self> {
        if !fraction.is_finite() || fraction <= 0.0 || fraction >= 1.0 {
            return Err(eyre!("slippage fraction must be in (0, 1), got {fraction}"));
        }
        Self::from_bps(whole_bps(fraction * BPS_DENOMINATOR as f64)?)
    }

    /// `1.5` is one and a half percent, i.e. 150 bps.
    pub fn from_percent(percent: f64) -> Result<Self> {
        if !percent.is_finite() || percent <= 0.0 || percent >= 100.0 {
            return Err(eyre!("slippage percent must be in (0, 100), got {percent}"));
        }
        Self::from_bps(whole_bps(percent * (BPS_DENOMINATOR / 100) as f64)?)
    }

    pub fn bps(&self) -> u32 {
        self.0
    }

    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / BPS_DENOMINATOR as f64
    }

    /// `floor(estimated * (1 - slippage))`, exact for any `U256` input.
    pub fn min_out(&self, estimated: U256) -> U256 {
        let denominator = U256::from(BPS_DENOMINATOR);
        let keep = U256::from(BPS_DENOMINATOR - self.0);
        // estimated = q * d + r, so the floor splits into q * keep + floor(r * keep / d)
        let (q, r) = estimated.div_rem(denominator);
        q * keep + r * keep / denominator
    }
}

impl Display for Slippage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}%", self.0 as f64 / 100.0)
    }
}

/// One requested trade. Native coin is addressed by `NATIVE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapIntent {
    pub from: Address,
    pub to: Address,
    /// In the source token's smallest unit
    pub amount_in: U256,
    pub slippage: Slippage,
    pub deadline_offset: Duration,
}

impl SwapIntent {
    pub fn new(from: Address, to: Address, amount_in: U256, slippage: Slippage, deadline_offset: Duration) -> Self {
        Self { from, to, amount_in, slippage, deadline_offset }
    }

    pub fn is_native_in(&self) -> bool {
        self.from == NATIVE
    }

    pub fn is_native_out(&self) -> bool {
        self.to == NATIVE
    }

    /// Token-originated trades spend through an ERC-20 allowance.
    pub fn requires_allowance(&self) -> bool {
        !self.is_native_in()
    }

    /// Unix timestamp after which the router must reject the call.
    pub fn deadline_from(&self, now_unix_secs: u64) -> U256 {
        U256::from(now_unix_secs.saturating_add(self.deadline_offset.as_secs()))
    }
}

/// Ordered hops of a trade, direct (2 tokens) or through the bridge token (3 tokens).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SwapPath {
    tokens: Vec<TokenWrapper>,
}

impl Display for SwapPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let symbols: Vec<String> = self.tokens.iter().map(|t| t.get_symbol()).collect();
        write!(f, "{}", symbols.join(" -> "))
    }
}

impl SwapPath {
    pub fn new(tokens: Vec<TokenWrapper>) -> Result<Self> {
        if tokens.len() < 2 || tokens.len() > 3 {
            return Err(eyre!("path must have 2 or 3 hops, got {}", tokens.len()));
        }
        if tokens.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(eyre!("path repeats a token in consecutive hops"));
        }
        Ok(Self { tokens })
    }

    pub fn direct(from: TokenWrapper, to: TokenWrapper) -> Result<Self> {
        Self::new(vec![from, to])
    }

    pub fn via(from: TokenWrapper, bridge: TokenWrapper, to: TokenWrapper) -> Result<Self> {
        Self::new(vec![from, bridge, to])
    }

    pub fn tokens(&self) -> &[TokenWrapper] {
        &self.tokens
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.tokens.iter().map(|t| t.get_address()).collect()
    }

    pub fn first(&self) -> &TokenWrapper {
        &self.tokens[0]
    }

    pub fn last(&self) -> &TokenWrapper {
        &self.tokens[self.tokens.len() - 1]
    }

    pub fn hops(&self) -> usize {
        self.tokens.len()
    }
}

/// Result of route resolution: candidate paths in priority order plus the pool fee tier in
/// concentrated-liquidity mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub candidates: Vec<SwapPath>,
    pub fee_tier: Option<FeeTier>,
}

impl ResolvedRoute {
    pub fn primary(&self) -> Option<&SwapPath> {
        self.candidates.first()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub path: SwapPath,
    pub fee_tier: Option<FeeTier>,
    pub amount_in: U256,
    pub estimated_out: U256,
    pub min_out: U256,
}

impl Quote {
    pub fn new(path: SwapPath, fee_tier: Option<FeeTier>, amount_in: U256, estimated_out: U256, slippage: Slippage) -> Self {
        let min_out = slippage.min_out(estimated_out);
        Self { path, fee_tier, amount_in, estimated_out, min_out }
    }

    /// Quote without slippage protection, for explicit best-effort mode only.
    pub fn unprotected(path: SwapPath, fee_tier: Option<FeeTier>, amount_in: U256) -> Self {
        Self { path, fee_tier, amount_in, estimated_out: U256::ZERO, min_out: U256::ZERO }
    }

    pub fn is_protected(&self) -> bool {
        !self.min_out.is_zero()
    }
}
