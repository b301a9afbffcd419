//! Identity verification.
//!
//! Two interchangeable strategies prove "account X issued this request": a
//! wallet signature over a structured sign-in payload, or a bearer token
//! issued by the trusted identity service. A deployment wires exactly one
//! strategy; the other credential kind is rejected with
//! [`AuthError::MissingCredential`].

pub mod bearer_token;
pub mod signed_message;

pub use bearer_token::{BearerTokenVerifier, HttpTokenService, TokenService};
pub use signed_message::SignedMessageVerifier;

use crate::errors::AuthError;
use crate::types::{IdentityClaim, VerifiedIdentity};
use async_trait::async_trait;

/// Validates a caller's asserted identity against its credential.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies the claim, producing a trusted per-request identity binding.
    ///
    /// In the signed-message strategy the binding carries the recovered
    /// wallet address, which downstream payment verification uses to reject
    /// payments made from a different wallet. The bearer-token strategy
    /// proves no wallet, so the binding carries none and that cross-check is
    /// unavailable — an accepted trust boundary of that mode.
    async fn verify(&self, claim: &IdentityClaim) -> Result<VerifiedIdentity, AuthError>;
}
