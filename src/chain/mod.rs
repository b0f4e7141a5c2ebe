/// Chain Access Layer
///
/// This layer is responsible for:
/// - Typed capability interfaces for the router, pool factory, quoter and ERC-20 tokens
/// - The JSON-RPC backend that signs and submits transactions
/// - Token metadata resolution, memoized for the process lifetime
///
/// Everything above this layer talks to contracts only through the traits in `clients`.

pub mod clients;
pub mod contracts;
pub mod metadata;
pub mod mock_chain;
pub mod rpc;

pub use clients::{
    ChainClient, Erc20Client, FactoryClient, FeeData, PreparedTransaction, QuoterClient, ReceiptSummary, RouterClient, RpcCallError,
    SwapBackend, TxStatus,
};
pub use metadata::TokenMetadataCache;
pub use mock_chain::{MockChain, MockRead};
pub use rpc::{ContractAddresses, RpcChain, parse_private_key};
