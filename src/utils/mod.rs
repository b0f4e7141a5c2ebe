pub mod token;
pub mod constants;
pub mod config_loader;
pub mod swap_config;

pub use token::{Token, TokenWrapper};
pub use constants::*;
pub use config_loader::*;
pub use swap_config::{ApprovalPolicy, RouterKind, SwapConfig, SwapConfigRoot, SwapRequest, parse_asset};
