//! Marketplace configuration.
//!
//! A single immutable [`MarketConfig`] is built at startup and injected into
//! both verifiers and the action handlers. Nothing in the core reads ambient
//! globals or environment variables.

use crate::errors::PaymentError;
use crate::types::ActionKind;
use crate::utils::{parse_address, parse_caip19_asset};
use ethers::types::{Address, U256};
use std::time::Duration;

/// Immutable configuration consumed by the verification core.
#[derive(Clone, Debug)]
pub struct MarketConfig {
    /// Wallet that must receive every payment.
    pub recipient: Address,

    /// ERC-20 token contract whose Transfer events count as payment.
    pub token: Address,

    /// Price of creating a listing, in atomic units.
    pub listing_price: U256,

    /// Price of renting a featured slot, in atomic units.
    pub featured_price: U256,

    /// Domain/audience string bearer tokens must be scoped to.
    pub auth_domain: String,

    /// Upper bound on waiting for a transaction receipt.
    pub receipt_timeout: Duration,

    /// Interval between receipt polls.
    pub receipt_poll_interval: Duration,

    /// How long a rented featured slot stays active.
    pub featured_duration: chrono::Duration,
}

impl MarketConfig {
    /// Creates a configuration from explicit values.
    ///
    /// `token` accepts either a bare contract address or a CAIP-19 asset id
    /// (`eip155:<chain>/erc20:<address>`).
    ///
    /// # Examples
    ///
    /// ```
    /// use minimart_core::config::MarketConfig;
    ///
    /// let config = MarketConfig::new(
    ///     "0xa6dee9fde9e1203ad02228f00bf10235d9ca3752",
    ///     "eip155:8453/erc20:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
    ///     5_000_000u64,  // $5.00 in USDC atomic units
    ///     50_000_000u64, // $50.00
    ///     "market.example.com",
    /// ).unwrap();
    /// assert_eq!(config.auth_domain, "market.example.com");
    /// ```
    pub fn new(
        recipient: &str,
        token: &str,
        listing_price: impl Into<U256>,
        featured_price: impl Into<U256>,
        auth_domain: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        let token = if token.contains(':') {
            parse_caip19_asset(token)?
        } else {
            parse_address(token)?
        };

        Ok(Self {
            recipient: parse_address(recipient)?,
            token,
            listing_price: listing_price.into(),
            featured_price: featured_price.into(),
            auth_domain: auth_domain.into(),
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_secs(2),
            featured_duration: chrono::Duration::hours(24),
        })
    }

    /// Sets the receipt wait bound.
    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// Sets the receipt poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    /// Sets how long a featured slot rental lasts.
    pub fn with_featured_duration(mut self, duration: chrono::Duration) -> Self {
        self.featured_duration = duration;
        self
    }

    /// Price charged for a given action kind. Deletions are unpaid.
    pub fn price_for(&self, kind: ActionKind) -> U256 {
        match kind {
            ActionKind::Listing => self.listing_price,
            ActionKind::Featured => self.featured_price,
            ActionKind::DeleteListing | ActionKind::DeleteFeatured => U256::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MarketConfig {
        MarketConfig::new(
            "0xa6dee9fde9e1203ad02228f00bf10235d9ca3752",
            "eip155:8453/erc20:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            5_000_000u64,
            50_000_000u64,
            "market.example.com",
        )
        .unwrap()
    }

    #[test]
    fn test_caip19_token_parsing() {
        let config = config();
        assert_eq!(
            config.token,
            parse_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap()
        );
    }

    #[test]
    fn test_bare_address_token() {
        let config = MarketConfig::new(
            "0xa6dee9fde9e1203ad02228f00bf10235d9ca3752",
            "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            1u64,
            2u64,
            "d",
        )
        .unwrap();
        assert_eq!(config.listing_price, U256::from(1u64));
    }

    #[test]
    fn test_price_for_kind() {
        let config = config();
        assert_eq!(config.price_for(ActionKind::Listing), U256::from(5_000_000u64));
        assert_eq!(
            config.price_for(ActionKind::Featured),
            U256::from(50_000_000u64)
        );
        assert_eq!(config.price_for(ActionKind::DeleteListing), U256::zero());
    }

    #[test]
    fn test_builders() {
        let config = config()
            .with_receipt_timeout(Duration::from_secs(5))
            .with_featured_duration(chrono::Duration::hours(48));
        assert_eq!(config.receipt_timeout, Duration::from_secs(5));
        assert_eq!(config.featured_duration, chrono::Duration::hours(48));
    }

    #[test]
    fn test_rejects_bad_recipient() {
        assert!(MarketConfig::new("nope", "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 1u64, 2u64, "d").is_err());
    }
}
