use crate::chain::{ReceiptSummary, TxStatus};
use crate::logic::{Quote, SwapIntent};
use crate::swap_error::{FailureKind, SwapError};
use alloy_primitives::{B256, I256, U256};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Outcome of `AllowanceManager::ensure_allowance`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApprovalOutcome {
    AlreadySufficient { current: U256 },
    Approved { tx_hash: B256, allowance: U256, unlimited: bool },
}

impl ApprovalOutcome {
    pub fn submitted_approval(&self) -> bool {
        matches!(self, ApprovalOutcome::Approved { .. })
    }
}

/// Confirmed trade. Built once from the receipt and the measured balance change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionResult {
    pub tx_hash: B256,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Balance change of the destination asset; the authoritative amount received. `None` when
    /// the balance could not be read back after confirmation.
    pub actual_out_amount: Option<I256>,
}

impl TransactionResult {
    pub fn new(receipt: &ReceiptSummary, actual_out_amount: Option<I256>) -> Self {
        Self {
            tx_hash: receipt.tx_hash,
            status: receipt.status,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            actual_out_amount,
        }
    }
}

/// Per-trade state machine. `Confirmed` and `Failed` are terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwapState {
    Idle,
    RouteResolved,
    Quoted,
    Approved,
    Submitted,
    Confirmed,
    Failed(FailureKind),
}

impl SwapState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapState::Confirmed | SwapState::Failed(_))
    }
}

impl Display for SwapState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SwapState::Failed(kind) => write!(f, "Failed({kind})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Everything known about one trade after it reached a terminal state.
#[derive(Debug)]
pub struct TradeReport {
    pub intent: SwapIntent,
    pub states: Vec<SwapState>,
    pub quote: Option<Quote>,
    pub approval: Option<ApprovalOutcome>,
    pub outcome: Result<TransactionResult, SwapError>,
    /// Non-fatal problems, e.g. degraded token metadata
    pub warnings: Vec<SwapError>,
}

impl TradeReport {
    pub fn final_state(&self) -> &SwapState {
        self.states.last().unwrap_or(&SwapState::Idle)
    }

    pub fn is_confirmed(&self) -> bool {
        *self.final_state() == SwapState::Confirmed
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.final_state() {
            SwapState::Failed(kind) => Some(*kind),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub trades: Vec<TradeReport>,
}

impl BatchReport {
    pub fn confirmed(&self) -> usize {
        self.trades.iter().filter(|t| t.is_confirmed()).count()
    }

    pub fn failed(&self) -> usize {
        self.trades.len() - self.confirmed()
    }
}
