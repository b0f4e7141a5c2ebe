use crate::logic::Slippage;
use crate::utils::config_loader::{ConfigLoader, ConfigLoaderSync, LoadConfigError, load_from_file, load_from_file_sync};
use crate::utils::constants::{
    BPS_DENOMINATOR, DEFAULT_DEADLINE_SECS, DEFAULT_FEE_HEADROOM_PERCENT, DEFAULT_GAS_LIMIT, DEFAULT_INTER_TRADE_DELAY_MS,
    DEFAULT_RECEIPT_TIMEOUT_SECS, DEFAULT_SLIPPAGE_BPS, NATIVE,
};
use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{Display, EnumString};

/// Which router interface is deployed, and with it which quoting and execution strategy applies.
#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
    /// Address-path router with `getAmountsOut` and `swapExact*` entry points
    #[default]
    Classic,
    /// Single pool router with fee tiers, a quoter contract and `multicall`
    Concentrated,
}

#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// Approve exactly the amount about to be spent
    #[default]
    Exact,
    /// Approve `U256::MAX` once. Saves approvals on repeated trades but leaves the router able to
    /// move the whole balance.
    Unlimited,
}

/// One requested trade as written in the config file. Amounts are decimal strings in token units.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SwapRequest {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub slippage_bps: Option<u32>,
}

impl SwapRequest {
    pub fn from_address(&self) -> Result<Address, LoadConfigError> {
        parse_asset(&self.from)
    }

    pub fn to_address(&self) -> Result<Address, LoadConfigError> {
        parse_asset(&self.to)
    }
}

/// `"native"` (any case) maps to the native marker; anything else must be a hex address.
pub fn parse_asset(raw: &str) -> Result<Address, LoadConfigError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("native") {
        return Ok(NATIVE);
    }
    Address::from_str(raw).map_err(|e| LoadConfigError::ConfigError(format!("invalid address {raw:?}: {e}")))
}

#[derive(Clone, Deserialize, Debug)]
pub struct SwapConfigRoot {
    pub autoswap: SwapConfig,
    #[serde(default)]
    pub swaps: Vec<SwapRequest>,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct SwapConfig {
    pub rpc_url: String,
    /// Expected chain id; startup fails when the node reports another one
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub router_kind: RouterKind,
    pub router: Address,
    pub factory: Option<Address>,
    pub quoter: Option<Address>,
    pub wrapped_native: Address,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    pub wrapped_native_symbol: Option<String>,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_fee_headroom_percent")]
    pub fee_headroom_percent: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default)]
    pub approval_policy: ApprovalPolicy,
    /// Proceed with a zero minimum output when quoting fails. Disables slippage protection.
    #[serde(default)]
    pub best_effort_quotes: bool,
    #[serde(default = "default_inter_trade_delay_ms")]
    pub inter_trade_delay_ms: u64,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

fn default_native_symbol() -> String {
    "NATIVE".to_string()
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_fee_headroom_percent() -> u64 {
    DEFAULT_FEE_HEADROOM_PERCENT
}

fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE_SECS
}

fn default_slippage_bps() -> u32 {
    DEFAULT_SLIPPAGE_BPS
}

fn default_inter_trade_delay_ms() -> u64 {
    DEFAULT_INTER_TRADE_DELAY_MS
}

fn default_receipt_timeout_secs() -> u64 {
    DEFAULT_RECEIPT_TIMEOUT_SECS
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, LoadConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| LoadConfigError::ConfigError(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn slippage_bps_from_percent(percent: f64) -> Result<u32, LoadConfigError> {
    Slippage::from_percent(percent).map(|s| s.bps()).map_err(|e| LoadConfigError::ConfigError(format!("Invalid SLIPPAGE: {e}")))
}

fn env_required<T: FromStr>(name: &str) -> Result<T, LoadConfigError>
where
    T::Err: std::fmt::Display,
{
    env_parse(name)?.ok_or_else(|| LoadConfigError::ConfigError(format!("{name} is not set")))
}

impl SwapConfig {
    pub fn new(rpc_url: String, router_kind: RouterKind, router: Address, wrapped_native: Address) -> Self {
        Self {
            rpc_url,
            chain_id: None,
            router_kind,
            router,
            factory: None,
            quoter: None,
            wrapped_native,
            native_symbol: default_native_symbol(),
            wrapped_native_symbol: None,
            gas_limit: DEFAULT_GAS_LIMIT,
            fee_headroom_percent: DEFAULT_FEE_HEADROOM_PERCENT,
            deadline_secs: DEFAULT_DEADLINE_SECS,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            approval_policy: ApprovalPolicy::default(),
            best_effort_quotes: false,
            inter_trade_delay_ms: DEFAULT_INTER_TRADE_DELAY_MS,
            receipt_timeout_secs: DEFAULT_RECEIPT_TIMEOUT_SECS,
        }
    }

    /// Load configuration from the environment variables the bot has always used.
    ///
    /// `SLIPPAGE` is a percentage and `DEADLINE_MINUTES` is in minutes. When `AMOUNT_IN` and
    /// `SWAP_PAIRS` (`from:to,from:to`) are set the returned request list is non-empty.
    pub fn from_env() -> Result<(Self, Vec<SwapRequest>), LoadConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::new(
            env_required("RPC_URL")?,
            env_parse("ROUTER_KIND")?.unwrap_or_default(),
            env_required("ROUTER_ADDRESS")?,
            env_required("WNATIVE")?,
        );
        config.chain_id = env_parse("CHAIN_ID")?;
        config.factory = env_parse("FACTORY_ADDRESS")?;
        config.quoter = env_parse("QUOTER_ADDRESS")?;
        if let Some(symbol) = env_parse::<String>("NATIVE_SYMBOL")? {
            config.native_symbol = symbol;
        }
        if let Some(gas_limit) = env_parse("GAS_LIMIT")? {
            config.gas_limit = gas_limit;
        }
        if let Some(percent) = env_parse::<f64>("SLIPPAGE")? {
            config.slippage_bps = slippage_bps_from_percent(percent)?;
        }
        if let Some(minutes) = env_parse::<u64>("DEADLINE_MINUTES")? {
            config.deadline_secs = minutes * 60;
        }
        if let Some(policy) = env_parse("APPROVAL_POLICY")? {
            config.approval_policy = policy;
        }
        if let Some(best_effort) = env_parse("BEST_EFFORT_QUOTES")? {
            config.best_effort_quotes = best_effort;
        }
        if let Some(delay) = env_parse("INTER_TRADE_DELAY_MS")? {
            config.inter_trade_delay_ms = delay;
        }

        let mut requests = Vec::new();
        if let (Some(amount), Some(pairs)) = (env_parse::<String>("AMOUNT_IN")?, env_parse::<String>("SWAP_PAIRS")?) {
            for pair in pairs.split(',').filter(|p| !p.trim().is_empty()) {
                let (from, to) = pair
                    .split_once(':')
                    .ok_or_else(|| LoadConfigError::ConfigError(format!("Invalid SWAP_PAIRS entry {pair:?}")))?;
                requests.push(SwapRequest { from: from.trim().to_string(), to: to.trim().to_string(), amount: amount.clone(), slippage_bps: None });
            }
        }

        config.validate()?;
        Ok((config, requests))
    }

    pub fn validate(&self) -> Result<(), LoadConfigError> {
        if self.slippage_bps == 0 || self.slippage_bps >= BPS_DENOMINATOR {
            return Err(LoadConfigError::ConfigError(format!("slippage_bps must be in 1..{BPS_DENOMINATOR}, got {}", self.slippage_bps)));
        }
        if self.gas_limit == 0 {
            return Err(LoadConfigError::ConfigError("gas_limit must be positive".to_string()));
        }
        if self.fee_headroom_percent < 100 {
            return Err(LoadConfigError::ConfigError("fee_headroom_percent must be at least 100".to_string()));
        }
        if self.router_kind == RouterKind::Concentrated && self.quoter.is_none() {
            return Err(LoadConfigError::ConfigError("concentrated router requires a quoter address".to_string()));
        }
        if self.wrapped_native == NATIVE {
            return Err(LoadConfigError::ConfigError("wrapped_native must be a token address".to_string()));
        }
        Ok(())
    }

    pub fn wrapped_native_symbol(&self) -> String {
        self.wrapped_native_symbol.clone().unwrap_or_else(|| format!("W{}", self.native_symbol))
    }

    pub fn inter_trade_delay(&self) -> Duration {
        Duration::from_millis(self.inter_trade_delay_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn deadline_offset(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

#[async_trait]
impl ConfigLoader for SwapConfigRoot {
    type SectionType = SwapConfigRoot;

    async fn load_section_from_file(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let root: SwapConfigRoot = load_from_file(file_name).await?;
        root.autoswap.validate()?;
        Ok(root)
    }
}

impl ConfigLoaderSync for SwapConfigRoot {
    type SectionType = SwapConfigRoot;

    fn load_section_from_file_sync(file_name: String) -> Result<Self::SectionType, LoadConfigError> {
        let root: SwapConfigRoot = load_from_file_sync(file_name)?;
        root.autoswap.validate()?;
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config_loader::load_from_str;
    use crate::utils::constants::XosTestnetAddress;

    const CONFIG: &str = r#"
[autoswap]
rpc_url = "https://testnet-rpc.example.org"
router = "0xdc7d6b58c89a554b3fdc4b5b10de9b4dbf39fb40"
wrapped_native = "0x0AAB67cf6F2e99847b9A95DeC950B250D648c1BB"
native_symbol = "XOS"
slippage_bps = 50

[[swaps]]
from = "native"
to = "0xb2C1C007421f0Eb5f4B3b3F38723C309Bb208d7d"
amount = "0.001"
"#;

    #[test]
    fn test_load_from_str() {
        let root: SwapConfigRoot = load_from_str(CONFIG).unwrap();
        let config = root.autoswap;

        assert_eq!(config.router, XosTestnetAddress::ROUTER);
        assert_eq!(config.router_kind, RouterKind::Classic);
        assert_eq!(config.slippage_bps, 50);
        assert_eq!(config.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(config.approval_policy, ApprovalPolicy::Exact);
        assert!(!config.best_effort_quotes);
        assert_eq!(config.wrapped_native_symbol(), "WXOS");
        assert!(config.validate().is_ok());

        assert_eq!(root.swaps.len(), 1);
        assert_eq!(root.swaps[0].from_address().unwrap(), NATIVE);
        assert_eq!(root.swaps[0].to_address().unwrap(), XosTestnetAddress::USDC);
    }

    #[test]
    fn test_slippage_percent_must_be_whole_bps() {
        assert_eq!(slippage_bps_from_percent(1.0).unwrap(), 100);
        assert_eq!(slippage_bps_from_percent(0.25).unwrap(), 25);
        assert!(matches!(slippage_bps_from_percent(0.015), Err(LoadConfigError::ConfigError(_))));
        assert!(slippage_bps_from_percent(0.0).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SwapConfig::new("http://localhost:8545".to_string(), RouterKind::Classic, Address::repeat_byte(1), Address::repeat_byte(2));
        assert!(config.validate().is_ok());

        config.slippage_bps = BPS_DENOMINATOR;
        assert!(config.validate().is_err());

        config.slippage_bps = 100;
        config.router_kind = RouterKind::Concentrated;
        assert!(config.validate().is_err());

        config.quoter = Some(Address::repeat_byte(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_asset() {
        assert_eq!(parse_asset("NATIVE").unwrap(), NATIVE);
        assert_eq!(parse_asset(" 0x0aab67cf6f2e99847b9a95dec950b250d648c1bb ").unwrap(), XosTestnetAddress::WXOS);
        assert!(parse_asset("usdc").is_err());
    }
}
