/// Logic Layer - Route and Quote Decisions
///
/// This layer is responsible for:
/// - Building candidate swap paths (direct, or through the wrapped-native bridge)
/// - Finding the fee tier of a live concentrated-liquidity pool
/// - Quoting expected output and the slippage-bounded minimum
///
/// It only reads from the chain; nothing here submits a transaction.

pub mod fee_tier_resolver;
pub mod path_builder;
pub mod quote_engine;
pub mod types;

// Re-export key components from the logic layer
pub use fee_tier_resolver::FeeTierResolver;
pub use path_builder::{candidate_paths, single_pool_path};
pub use quote_engine::QuoteEngine;
pub use types::{FeeTier, Quote, ResolvedRoute, Slippage, SwapIntent, SwapPath};
