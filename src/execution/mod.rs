/// Execution Layer
///
/// This layer is responsible for:
/// - Gas pricing with a fixed limit and fee headroom
/// - Allowance checks and approval transactions
/// - Encoding and submitting router calls, including the composed swap + unwrap
/// - Balance-diff verification of what a trade delivered
/// - The per-trade state machine and sequential batches

pub mod allowance;
pub mod balance;
pub mod gas;
pub mod orchestrator;
pub mod transaction_executor;
pub mod types;


// Re-export key components from the execution layer
pub use allowance::AllowanceManager;
pub use balance::BalanceVerifier;
pub use gas::GasPolicy;
pub use orchestrator::SwapOrchestrator;
pub use transaction_executor::SwapExecutor;
pub use types::{ApprovalOutcome, BatchReport, SwapState, TradeReport, TransactionResult};
