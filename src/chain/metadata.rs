use super::clients::Erc20Client;
use crate::utils::constants::{NATIVE, NATIVE_DECIMALS};
use crate::utils::{Token, TokenWrapper};
use alloy_primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Process-lifetime cache of token symbol/decimals, keyed by address.
///
/// Metadata is advisory: a failed read never fails the caller. It yields a placeholder
/// descriptor (address as symbol, 18 decimals) flagged as degraded, and the placeholder is
/// cached like any other entry.
pub struct TokenMetadataCache {
    erc20: Arc<dyn Erc20Client>,
    wrapped_native: TokenWrapper,
    native: TokenWrapper,
    tokens: DashMap<Address, TokenWrapper>,
}

impl TokenMetadataCache {
    pub fn new(erc20: Arc<dyn Erc20Client>, wrapped_native: Address, native_symbol: &str, wrapped_native_symbol: &str) -> Self {
        Self {
            erc20,
            wrapped_native: Arc::new(Token::new_with_data(
                wrapped_native,
                Some(wrapped_native_symbol.to_string()),
                Some(NATIVE_DECIMALS),
            )),
            native: Arc::new(Token::new_with_data(NATIVE, Some(native_symbol.to_string()), Some(NATIVE_DECIMALS))),
            tokens: DashMap::new(),
        }
    }

    pub fn wrapped_native(&self) -> TokenWrapper {
        self.wrapped_native.clone()
    }

    pub fn native(&self) -> TokenWrapper {
        self.native.clone()
    }

    pub fn is_wrapped_native(&self, address: &Address) -> bool {
        self.wrapped_native.get_address() == *address
    }

    pub async fn resolve(&self, address: Address) -> TokenWrapper {
        if address == NATIVE {
            return self.native.clone();
        }
        if self.is_wrapped_native(&address) {
            return self.wrapped_native.clone();
        }
        if let Some(token) = self.tokens.get(&address) {
            return token.clone();
        }

        let token = Arc::new(self.fetch(address).await);
        // a concurrent resolve may have raced us; keep whichever landed first
        self.tokens.entry(address).or_insert(token).clone()
    }

    async fn fetch(&self, address: Address) -> Token {
        let symbol = self.erc20.symbol(address).await;
        let decimals = self.erc20.decimals(address).await;

        match (symbol, decimals) {
            (Ok(symbol), Ok(decimals)) => {
                debug!("Resolved token {} as {} ({} decimals)", address, symbol, decimals);
                Token::new_with_data(address, Some(symbol), Some(decimals))
            }
            (symbol, decimals) => {
                let reason = symbol.err().or(decimals.err()).map(|e| e.to_string()).unwrap_or_default();
                warn!("Metadata degraded for token {}: {}. Using address as symbol and 18 decimals", address, reason);
                Token::placeholder(address)
            }
        }
    }

    pub fn cached_len(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock_chain::MockChain;

    fn cache_for(mock: &Arc<MockChain>) -> TokenMetadataCache {
        TokenMetadataCache::new(mock.clone(), MockChain::WRAPPED_NATIVE, "XOS", "WXOS")
    }

    #[tokio::test]
    async fn test_wrapped_native_without_network() {
        let mock = Arc::new(MockChain::new());
        let cache = cache_for(&mock);

        let token = cache.resolve(MockChain::WRAPPED_NATIVE).await;

        assert_eq!(token.get_symbol(), "WXOS");
        assert_eq!(token.get_decimals(), 18);
        assert_eq!(mock.metadata_reads(), 0);
    }

    #[tokio::test]
    async fn test_resolves_once() {
        let mock = Arc::new(MockChain::new());
        let usdc = Address::repeat_byte(0xc1);
        mock.add_token(usdc, "USDC", 6);
        let cache = cache_for(&mock);

        let first = cache.resolve(usdc).await;
        let second = cache.resolve(usdc).await;

        assert_eq!(first.get_symbol(), "USDC");
        assert_eq!(second.get_decimals(), 6);
        assert_eq!(mock.metadata_reads(), 2);
        assert_eq!(cache.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_failed_read_falls_back_to_placeholder() {
        let mock = Arc::new(MockChain::new());
        let unknown = Address::repeat_byte(0x77);
        let cache = cache_for(&mock);

        let token = cache.resolve(unknown).await;

        assert!(token.is_degraded());
        assert_eq!(token.get_decimals(), 18);
        assert_eq!(token.get_symbol(), unknown.to_string());
    }
}
