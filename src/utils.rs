//! Utility functions shared across the verification core.

use crate::errors::{AuthError, PaymentError};
use ethers::types::{Address, H256, U256};
use std::str::FromStr;

/// Validates and parses an EVM address.
///
/// # Examples
///
/// ```
/// use minimart_core::utils::parse_address;
///
/// let addr = parse_address("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb").unwrap();
/// assert!(!format!("{:?}", addr).is_empty());
/// ```
pub fn parse_address(addr: &str) -> Result<Address, PaymentError> {
    Address::from_str(addr)
        .map_err(|e| PaymentError::InvalidReference(format!("{}: {}", addr, e)))
}

/// Parses a transaction reference into a 32-byte hash.
///
/// # Examples
///
/// ```
/// use minimart_core::utils::parse_tx_reference;
///
/// let hash = parse_tx_reference(
///     "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
/// );
/// assert!(hash.is_ok());
/// assert!(parse_tx_reference("not-a-hash").is_err());
/// ```
pub fn parse_tx_reference(reference: &str) -> Result<H256, PaymentError> {
    H256::from_str(reference)
        .map_err(|e| PaymentError::InvalidReference(format!("{}: {}", reference, e)))
}

/// Converts a string representation of an amount in atomic units to U256.
///
/// Accepts decimal, or hex with a 0x prefix.
///
/// # Examples
///
/// ```
/// use minimart_core::utils::string_to_u256;
///
/// assert_eq!(string_to_u256("5000000").unwrap(), 5000000u64.into());
/// assert_eq!(string_to_u256("0x4c4b40").unwrap(), 5000000u64.into());
/// ```
pub fn string_to_u256(s: &str) -> Result<U256, PaymentError> {
    if let Ok(value) = U256::from_dec_str(s) {
        return Ok(value);
    }

    if s.starts_with("0x") || s.starts_with("0X") {
        if let Ok(value) = U256::from_str(s) {
            return Ok(value);
        }
    }

    Err(PaymentError::InvalidReference(format!(
        "cannot parse '{}' as an amount",
        s
    )))
}

/// Extracts the contract address from a CAIP-19 asset identifier such as
/// `eip155:8453/erc20:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913`.
///
/// # Examples
///
/// ```
/// use minimart_core::utils::parse_caip19_asset;
///
/// let token = parse_caip19_asset(
///     "eip155:8453/erc20:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
/// ).unwrap();
/// assert_eq!(format!("{:#x}", token), "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913");
/// ```
pub fn parse_caip19_asset(asset: &str) -> Result<Address, PaymentError> {
    let address_part = asset
        .split(':')
        .nth(2)
        .ok_or_else(|| PaymentError::InvalidReference(format!("not a CAIP-19 id: {}", asset)))?;
    parse_address(address_part)
}

/// Decodes a 65-byte hex signature (with or without 0x prefix).
pub fn parse_signature_bytes(sig: &str) -> Result<Vec<u8>, AuthError> {
    let sig_hex = sig.trim_start_matches("0x");
    if sig_hex.len() != 130 {
        return Err(AuthError::InvalidSignature(format!(
            "expected 65 bytes, got {} hex chars",
            sig_hex.len()
        )));
    }
    hex::decode(sig_hex).map_err(|e| AuthError::InvalidSignature(e.to_string()))
}

/// Generates a random high-entropy nonce for the sign-in flow.
///
/// # Examples
///
/// ```
/// use minimart_core::utils::generate_nonce;
///
/// let nonce = generate_nonce();
/// assert_eq!(nonce.len(), 32);
/// assert_ne!(nonce, generate_nonce());
/// ```
pub fn generate_nonce() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Generates an opaque listing id.
pub fn generate_id() -> String {
    use rand::Rng;
    let bytes: [u8; 12] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Gets the current Unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb").unwrap();
        let addr2 = parse_address("742d35Cc6634C0532925a3b844Bc9e7595f0bEbb").unwrap();
        assert_eq!(addr, addr2);

        assert!(parse_address("invalid").is_err());
    }

    #[test]
    fn test_address_comparison_is_case_insensitive() {
        // Parsing canonicalizes, so mixed-case and lower-case inputs compare equal.
        let checksummed = parse_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap();
        let lowered = parse_address("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913").unwrap();
        assert_eq!(checksummed, lowered);
    }

    #[test]
    fn test_parse_tx_reference() {
        let hash = parse_tx_reference(
            "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
        )
        .unwrap();
        assert_ne!(hash, H256::zero());

        assert!(parse_tx_reference("0x1234").is_err());
        assert!(parse_tx_reference("").is_err());
    }

    #[test]
    fn test_string_to_u256() {
        assert_eq!(string_to_u256("5000000").unwrap(), U256::from(5_000_000u64));
        assert_eq!(string_to_u256("0").unwrap(), U256::zero());
        assert!(string_to_u256("5.5").is_err());
        assert!(string_to_u256("abc").is_err());
    }

    #[test]
    fn test_parse_caip19_asset() {
        let token =
            parse_caip19_asset("eip155:8453/erc20:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")
                .unwrap();
        assert_eq!(
            token,
            parse_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap()
        );

        assert!(parse_caip19_asset("eip155:8453").is_err());
    }

    #[test]
    fn test_parse_signature_bytes() {
        let sig = format!("0x{}", "ab".repeat(65));
        assert_eq!(parse_signature_bytes(&sig).unwrap().len(), 65);

        assert!(parse_signature_bytes("0x1234").is_err());
        let bad_hex = format!("0x{}", "zz".repeat(65));
        assert!(parse_signature_bytes(&bad_hex).is_err());
    }

    #[test]
    fn test_generate_nonce_uniqueness() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp();
        assert!(ts > 1_600_000_000);
    }
}
