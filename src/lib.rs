// Three-Layer Architecture
pub mod chain; // Chain Layer: contract bindings, RPC backend, token metadata
pub mod logic; // Logic Layer: path building, fee tiers, quotes
pub mod execution; // Execution Layer: approvals, swaps, verification, orchestration

// Common utilities and types
pub mod swap_error;
pub mod utils;

// Re-export key components from each layer
pub use chain::{
    ChainClient, Erc20Client, FactoryClient, MockChain, QuoterClient, RouterClient, RpcChain, SwapBackend, TokenMetadataCache,
};
pub use execution::{
    AllowanceManager, ApprovalOutcome, BalanceVerifier, BatchReport, SwapExecutor, SwapOrchestrator, SwapState, TradeReport,
    TransactionResult,
};
pub use logic::{FeeTier, FeeTierResolver, Quote, QuoteEngine, ResolvedRoute, Slippage, SwapIntent, SwapPath};
pub use swap_error::{FailureKind, SwapError, SwapResult};
pub use utils::{ApprovalPolicy, RouterKind, SwapConfig, SwapConfigRoot, SwapRequest, Token, TokenWrapper};
