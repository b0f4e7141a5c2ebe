use alloy_primitives::{Address, B256, U256};
use eyre::Report;
use serde::Serialize;
use strum_macros::{Display, EnumString};

/// Category of a failed trade. This is what the orchestrator's `Failed` state carries.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash, EnumString, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    NoRoute,
    NoLiquidityPath,
    ApprovalFailed,
    InsufficientGasFunds,
    SwapExecutionFailed,
    Reverted,
    MetadataDegraded,
    BalanceUnverified,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    #[error("no route from {from} to {to}")]
    NoRoute { from: Address, to: Address },
    #[error("no liquidity path: {reason}")]
    NoLiquidityPath { reason: String },
    #[error("approval of {token} for {spender} failed: {reason}")]
    ApprovalFailed { token: Address, spender: Address, reason: String },
    #[error("insufficient native balance: need {required}, have {available}")]
    InsufficientGasFunds { required: U256, available: U256 },
    #[error("swap execution failed: {reason}{}", revert_suffix(.revert_reason))]
    SwapExecutionFailed { reason: String, revert_reason: Option<String>, tx_hash: Option<B256> },
    #[error("transaction {tx_hash} reverted{}", revert_suffix(.revert_reason))]
    Reverted { tx_hash: B256, block_number: Option<u64>, revert_reason: Option<String> },
    #[error("metadata for {token} degraded: {reason}")]
    MetadataDegraded { token: Address, reason: String },
    #[error("received amount of {token} unverified: {reason}")]
    BalanceUnverified { token: Address, reason: String },
    #[error(transparent)]
    Internal(#[from] Report),
}

fn revert_suffix(revert_reason: &Option<String>) -> String {
    match revert_reason {
        Some(reason) => format!(" (revert: {reason})"),
        None => String::new(),
    }
}

impl SwapError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SwapError::NoRoute { .. } => FailureKind::NoRoute,
            SwapError::NoLiquidityPath { .. } => FailureKind::NoLiquidityPath,
            SwapError::ApprovalFailed { .. } => FailureKind::ApprovalFailed,
            SwapError::InsufficientGasFunds { .. } => FailureKind::InsufficientGasFunds,
            SwapError::SwapExecutionFailed { .. } => FailureKind::SwapExecutionFailed,
            SwapError::Reverted { .. } => FailureKind::Reverted,
            SwapError::MetadataDegraded { .. } => FailureKind::MetadataDegraded,
            SwapError::BalanceUnverified { .. } => FailureKind::BalanceUnverified,
            SwapError::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn no_liquidity(reason: impl Into<String>) -> Self {
        SwapError::NoLiquidityPath { reason: reason.into() }
    }

    /// Revert message reported by the node, when one was decoded.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            SwapError::SwapExecutionFailed { revert_reason, .. } | SwapError::Reverted { revert_reason, .. } => {
                revert_reason.as_deref()
            }
            _ => None,
        }
    }

    /// Degraded metadata and an unreadable post-swap balance are recorded as warnings; a trade
    /// never fails on them.
    pub fn is_fatal_for_trade(&self) -> bool {
        !matches!(self, SwapError::MetadataDegraded { .. } | SwapError::BalanceUnverified { .. })
    }
}

pub type SwapResult<T> = Result<T, SwapError>;
