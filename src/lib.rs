//! # minimart-core
//!
//! Payment verification and authorization core for an on-chain mini-app
//! marketplace: users pay in an ERC-20 token to list mini-apps and to rent
//! featured carousel slots, and this crate is the logic that gates every
//! money-moving action.
//!
//! The adversarial failure modes it defends against:
//!
//! - **Forged identity**: a caller claiming an account id they do not hold
//! - **Replay**: reusing a consumed transaction hash for a second action
//! - **Underpayment**: a real transfer below the configured price
//! - **Hijacking**: claiming credit for a valid payment made by someone else
//!
//! ## Components
//!
//! - [`identity`]: validates a caller's claimed account id against a
//!   credential — either a wallet signature over a structured sign-in
//!   payload (personal-sign recovery) or a bearer token verified by a
//!   trusted identity service. One strategy per deployment.
//! - [`payment`]: fetches the finalized receipt for a claimed transaction,
//!   scans its token-transfer logs, and confirms recipient, amount, sender,
//!   and non-replay.
//! - [`ledger`]: the append-only record of consumed transaction references,
//!   keyed uniquely so double-spend races resolve to exactly one winner.
//! - [`market`]: the action-handler pattern — verify identity, verify
//!   payment, then commit ledger entry and business mutation as one atomic
//!   unit.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use minimart_core::config::MarketConfig;
//! use minimart_core::identity::SignedMessageVerifier;
//! use minimart_core::market::{Marketplace, MemoryStore};
//! use minimart_core::payment::RpcReceiptSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MarketConfig::new(
//!     "0xa6dee9fde9e1203ad02228f00bf10235d9ca3752",
//!     "eip155:8453/erc20:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
//!     5_000_000u64,  // listing: $5.00 USDC
//!     50_000_000u64, // featured slot: $50.00 USDC
//!     "market.example.com",
//! )?;
//!
//! let receipts = Arc::new(RpcReceiptSource::new("https://mainnet.base.org", &config)?);
//! let market = Marketplace::new(
//!     config,
//!     Arc::new(SignedMessageVerifier::new()),
//!     receipts,
//!     Arc::new(MemoryStore::new()),
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Design invariants
//!
//! - The replay check runs before any blockchain call; verification runs
//!   before any commit; ledger insert and business mutation are
//!   all-or-nothing.
//! - A business conflict (duplicate URL, taken slot) leaves the transaction
//!   reference unconsumed, so the caller can retry the business step with
//!   the same proof-of-payment instead of paying again.
//! - Amounts are compared in integer atomic units; no floating point.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod errors;
pub mod identity;
pub mod ledger;
pub mod market;
pub mod payment;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::MarketConfig;
pub use errors::{AuthError, ConflictError, MarketError, PaymentError, Result};
pub use identity::{BearerTokenVerifier, IdentityVerifier, SignedMessageVerifier};
pub use ledger::{LedgerEntry, MemoryLedger, ReplayGuard};
pub use market::{Marketplace, MemoryStore, Store};
pub use payment::{PaymentVerifier, ReceiptSource, RpcReceiptSource};
pub use types::{
    AccountId, ActionKind, Credential, FeaturedSlot, IdentityClaim, Listing, ListingDraft,
    SignInPayload, TokenClaims, TransferProof, TxStatus, VerifiedIdentity, SLOT_COUNT,
};
