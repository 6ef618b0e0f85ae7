//! Token registry
//!
//! Maps configured symbols and addresses to token metadata. The boundary needs
//! a token's decimals for every amount it converts, so an unregistered token is
//! rejected before a request reaches the engine.

use crate::error::{ApiError, Result};
use engine_config::TokenConfig;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use types::precision::{format_units, lp_decimals, parse_units};
use types::TokenAddress;

#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    by_address: HashMap<TokenAddress, TokenConfig>,
    by_symbol: HashMap<String, TokenAddress>,
}

impl TokenRegistry {
    pub fn new(tokens: &[TokenConfig]) -> Self {
        let mut registry = Self::default();
        for token in tokens {
            registry
                .by_symbol
                .insert(token.symbol.to_ascii_uppercase(), token.address);
            registry.by_address.insert(token.address, token.clone());
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    pub fn get(&self, address: &TokenAddress) -> Result<&TokenConfig> {
        self.by_address
            .get(address)
            .ok_or_else(|| ApiError::UnknownToken(address.to_string()))
    }

    /// Resolve a `0x` address or a symbol (case-insensitive)
    pub fn resolve(&self, token: &str) -> Result<&TokenConfig> {
        let address = match TokenAddress::from_str(token) {
            Ok(address) => address,
            Err(_) => *self
                .by_symbol
                .get(&token.trim().to_ascii_uppercase())
                .ok_or_else(|| ApiError::UnknownToken(token.to_string()))?,
        };
        self.get(&address)
    }

    pub fn parse_amount(
        &self,
        token: &TokenAddress,
        amount: &str,
        field: &'static str,
    ) -> Result<u128> {
        let decimals = self.get(token)?.decimals;
        parse_units(amount, decimals).map_err(ApiError::precision(field))
    }

    pub fn format_amount(&self, token: &TokenAddress, amount: u128) -> Result<String> {
        Ok(format_units(amount, self.get(token)?.decimals))
    }

    /// Decimals of the LP share of a pool over `token_a`/`token_b`
    pub fn lp_decimals(&self, token_a: &TokenAddress, token_b: &TokenAddress) -> Result<u8> {
        Ok(lp_decimals(
            self.get(token_a)?.decimals,
            self.get(token_b)?.decimals,
        ))
    }

    /// Display value of `amount` base units in USD, when a price is configured
    pub fn usd_value(&self, token: &TokenAddress, amount: u128) -> Option<Decimal> {
        let config = self.by_address.get(token)?;
        let price = config.price_usd?;
        let units = Decimal::from_str(&format_units(amount, config.decimals)).ok()?;
        units.checked_mul(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn registry() -> TokenRegistry {
        TokenRegistry::new(&[
            TokenConfig {
                symbol: "USDC".to_string(),
                address: TokenAddress::from_bytes([0x11; 20]),
                decimals: 6,
                price_usd: Some(dec!(1)),
            },
            TokenConfig {
                symbol: "WETH".to_string(),
                address: TokenAddress::from_bytes([0x22; 20]),
                decimals: 18,
                price_usd: None,
            },
        ])
    }

    #[test]
    fn test_resolve_by_symbol_or_address() {
        let registry = registry();
        assert_eq!(registry.resolve("usdc").unwrap().decimals, 6);
        let address = TokenAddress::from_bytes([0x22; 20]).to_string();
        assert_eq!(registry.resolve(&address).unwrap().symbol, "WETH");
        assert!(matches!(
            registry.resolve("DAI"),
            Err(ApiError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_amount_conversion_uses_token_decimals() {
        let registry = registry();
        let usdc = TokenAddress::from_bytes([0x11; 20]);
        assert_eq!(registry.parse_amount(&usdc, "2.5", "amount").unwrap(), 2_500_000);
        assert!(matches!(
            registry.parse_amount(&usdc, "0.0000001", "amount"),
            Err(ApiError::Precision { field: "amount", .. })
        ));
        assert_eq!(registry.format_amount(&usdc, 1_230_000).unwrap(), "1.23");
    }

    #[test]
    fn test_lp_decimals_and_usd_value() {
        let registry = registry();
        let usdc = TokenAddress::from_bytes([0x11; 20]);
        let weth = TokenAddress::from_bytes([0x22; 20]);
        assert_eq!(registry.lp_decimals(&usdc, &weth).unwrap(), 12);
        assert_eq!(registry.usd_value(&usdc, 3_000_000), Some(dec!(3)));
        assert_eq!(registry.usd_value(&weth, 1), None);
    }
}
