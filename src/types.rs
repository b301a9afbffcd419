//! Core type definitions for the marketplace verification core.
//!
//! Claims are transient, per-request inputs; listings, featured slots, and
//! ledger entries are the persisted shapes the action handlers commit. All
//! wire-facing types carry serde derives with camelCase field names matching
//! the marketplace API.

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Numeric account identifier on the social-identity graph (a "fid").
pub type AccountId = u64;

/// Number of featured carousel slots. Slot indices are `0..SLOT_COUNT`.
pub const SLOT_COUNT: u8 = 6;

/// A caller's asserted identity, before verification.
///
/// Transient: lives for one request and is never persisted.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IdentityClaim {
    /// The account id the caller claims to be.
    #[serde(rename = "accountId")]
    pub account_id: AccountId,

    /// The credential backing the claim.
    pub credential: Credential,
}

/// Credential variants. Exactly one verifier strategy is wired per
/// deployment; a claim carrying the wrong kind is rejected outright.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub enum Credential {
    /// Personal-sign credential: a signature over a structured JSON message
    /// that embeds the signer address and the nonce.
    SignedMessage {
        /// 65-byte signature, hex with 0x prefix.
        signature: String,
        /// The exact signed message (JSON, see [`SignInPayload`]).
        message: String,
        /// Caller-chosen nonce; must appear verbatim in the message.
        nonce: String,
    },
    /// Opaque bearer token issued by the trusted identity service.
    BearerToken {
        /// The token, verbatim.
        token: String,
    },
}

/// Structured payload signed by the wallet in the signed-message flow.
///
/// Replaces a fragile `Address: <hex>` line convention with typed fields:
/// the message the wallet signs is the JSON serialization of this struct.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignInPayload {
    /// Signer address, hex with 0x prefix.
    pub address: String,

    /// Nonce the caller supplied alongside the signature.
    pub nonce: String,

    /// Optional human-readable statement shown by the wallet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
}

/// Output of identity verification: a trusted binding for one request.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// The verified account id.
    pub account_id: AccountId,

    /// Wallet address recovered from the signature. `None` in the
    /// bearer-token flow, where no wallet is proven and payment-sender
    /// cross-checking is therefore unavailable.
    pub address: Option<Address>,
}

impl VerifiedIdentity {
    /// Recovered address as lower-cased hex, when present.
    pub fn address_hex(&self) -> Option<String> {
        self.address.map(|a| format!("{:#x}", a))
    }
}

/// Claims returned by the bearer-token identity service.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenClaims {
    /// Subject: the account id the token was issued to.
    pub sub: AccountId,

    /// Audience: the domain the token is scoped to.
    pub aud: String,

    /// Expiry as a Unix timestamp in seconds.
    pub exp: i64,
}

/// Proof extracted from a verified on-chain transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProof {
    /// Wallet that paid.
    pub from: Address,

    /// Wallet that received (the configured marketplace address).
    pub to: Address,

    /// Transferred amount in atomic units.
    pub value: U256,
}

/// What a ledger entry paid for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// A new listing was created.
    #[serde(rename = "LISTING")]
    Listing,

    /// A featured slot was rented or renewed.
    #[serde(rename = "FEATURED")]
    Featured,

    /// A listing was deleted (unpaid audit entry).
    #[serde(rename = "DELETE_LISTING")]
    DeleteListing,

    /// A featured slot was released (unpaid audit entry).
    #[serde(rename = "DELETE_FEATURED")]
    DeleteFeatured,
}

/// Outcome recorded on a ledger entry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// The action committed.
    #[serde(rename = "SUCCESS")]
    Success,

    /// The action was recorded as failed.
    #[serde(rename = "FAILED")]
    Failed,
}

/// A listed mini-app.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Opaque unique id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Short description.
    pub description: String,

    /// Launch URL; globally unique across listings.
    pub url: String,

    /// Icon image URL.
    pub icon_url: String,

    /// Category slug (taxonomy is out of core scope; kept as a string).
    pub category: String,

    /// Account that listed the app and owns it.
    pub owner_fid: AccountId,

    /// Whether the listing passed out-of-band verification.
    pub verified: bool,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new listing.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    /// Display name.
    pub name: String,

    /// Short description.
    pub description: String,

    /// Launch URL.
    pub url: String,

    /// Icon image URL.
    pub icon_url: String,

    /// Category slug.
    pub category: String,

    /// Whether the listing passed out-of-band verification.
    #[serde(default)]
    pub verified: bool,
}

/// A rented featured-carousel slot.
///
/// At most one non-expired slot exists per index. Expiry is implicit: a slot
/// whose `expires_at` has passed is free to reclaim without deletion.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedSlot {
    /// Slot position, `0..SLOT_COUNT`.
    pub slot_index: u8,

    /// The listing occupying the slot.
    pub listing_id: String,

    /// Instant at which the slot becomes free again.
    pub expires_at: DateTime<Utc>,
}

impl FeaturedSlot {
    /// Whether the slot is still active at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
