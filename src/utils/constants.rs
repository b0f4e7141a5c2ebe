use alloy_primitives::{Address, U256, address};

/// Marker address for the chain's native coin. Paths substitute the wrapped-native token for it.
pub const NATIVE: Address = Address::ZERO;

pub const NATIVE_DECIMALS: u8 = 18;

/// Decimals assumed when a token's metadata cannot be read.
pub const FALLBACK_DECIMALS: u8 = 18;

pub const BPS_DENOMINATOR: u32 = 10_000;

/// Allowance amount used by the unlimited approval policy.
pub const UNLIMITED_ALLOWANCE: U256 = U256::MAX;

pub const DEFAULT_GAS_LIMIT: u64 = 300_000;

pub const DEFAULT_FEE_HEADROOM_PERCENT: u64 = 110;

pub const DEFAULT_DEADLINE_SECS: u64 = 600;

pub const DEFAULT_SLIPPAGE_BPS: u32 = 100;

pub const DEFAULT_INTER_TRADE_DELAY_MS: u64 = 3_000;

pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;

#[non_exhaustive]
pub struct XosTestnetAddress;

impl XosTestnetAddress {
    pub const ROUTER: Address = address!("dc7D6b58c89A554b3FDC4B5B10De9b4DbF39FB40");
    pub const WXOS: Address = address!("0AAB67cf6F2e99847b9A95DeC950B250D648c1BB");
    pub const USDC: Address = address!("b2C1C007421f0Eb5f4B3b3F38723C309Bb208d7d");
    pub const USDT: Address = address!("2CCDB83a043A32898496c1030880Eb2cB977CAbc");
}
