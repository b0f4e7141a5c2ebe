use crate::utils::constants::{FALLBACK_DECIMALS, NATIVE};
use alloy_primitives::utils::{ParseUnits, Unit, format_units, parse_units};
use alloy_primitives::{Address, I256, U256};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::default::Default;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Resolved symbol/decimals for one token address. Immutable once built.
///
/// Equality, ordering and hashing only look at the address. `Address` is a byte array, so two
/// addresses parsed from differently-cased hex strings are the same value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Token {
    address: Address,
    decimals: u8,
    symbol: Option<String>,
    // metadata could not be read and placeholder values are in use
    #[serde(default)]
    degraded: bool,
}

pub type TokenWrapper = Arc<Token>;

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.get_address()
    }
}

impl Eq for Token {}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.get_address())
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_symbol())
    }
}

impl Token {
    pub fn new(address: Address) -> Token {
        Token { address, decimals: FALLBACK_DECIMALS, ..Token::default() }
    }

    pub fn new_with_data(address: Address, symbol: Option<String>, decimals: Option<u8>) -> Token {
        Token { address, symbol, decimals: decimals.unwrap_or(FALLBACK_DECIMALS), degraded: false }
    }

    /// Placeholder descriptor used when the on-chain reads fail.
    pub fn placeholder(address: Address) -> Token {
        Token { address, symbol: None, decimals: FALLBACK_DECIMALS, degraded: true }
    }

    // For testing purposes
    pub fn repeat_byte(byte: u8) -> Token {
        Token::new(Address::repeat_byte(byte))
    }

    /// Display symbol. Falls back to the checksummed address so the label is deterministic.
    pub fn get_symbol(&self) -> String {
        self.symbol.clone().unwrap_or(self.address.to_string())
    }

    pub fn get_decimals(&self) -> u8 {
        self.decimals
    }

    pub fn get_exp(&self) -> U256 {
        if self.decimals == 18 { Unit::ETHER.wei() } else { U256::from(10).pow(U256::from(self.decimals)) }
    }

    pub fn get_address(&self) -> Address {
        self.address
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_native(&self) -> bool {
        self.address == NATIVE
    }

    /// Human readable amount, e.g. `1.5` for 1_500_000 units of a 6-decimals token.
    pub fn format_amount(&self, value: U256) -> String {
        format_units(value, self.decimals).unwrap_or_else(|_| value.to_string())
    }

    pub fn format_signed_amount(&self, value: I256) -> String {
        let formatted = self.format_amount(value.unsigned_abs());
        if value.is_negative() { format!("-{formatted}") } else { formatted }
    }

    /// Parse a decimal string into the token's smallest unit.
    pub fn parse_amount(&self, value: &str) -> Result<U256> {
        let parsed: ParseUnits =
            parse_units(value.trim(), self.decimals).map_err(|e| eyre!("invalid amount {value:?} for {}: {e}", self.get_symbol()))?;
        if parsed.is_negative() {
            return Err(eyre!("negative amount {value:?}"));
        }
        Ok(parsed.get_absolute())
    }
}
