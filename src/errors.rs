//! Error types for the minimart-core library.
//!
//! Failures are split into three domains: identity verification, payment
//! verification, and business-state conflicts. Keeping the domains separate
//! matters at the API edge: a client must be able to tell "your payment proof
//! is bad" (resubmit payment) apart from "your payment was fine but the slot
//! was taken" (retry the business step with the same, still-unconsumed proof).

use thiserror::Error;

/// Identity verification failures.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The claim carried no credential, or a credential of the wrong kind
    /// for the configured verifier.
    #[error("missing or wrong-kind credential")]
    MissingCredential,

    /// Signature recovery failed, the signed payload was malformed, or the
    /// recovered signer does not match the address embedded in the payload.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The signed payload does not carry the caller-supplied nonce, or the
    /// nonce was already consumed.
    #[error("invalid nonce: {0}")]
    InvalidNonce(String),

    /// The bearer token is malformed, expired, has the wrong audience, or
    /// was rejected by the identity service.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token is valid but belongs to a different account than claimed.
    #[error("token subject {subject} does not match claimed account {claimed}")]
    IdentityMismatch {
        /// Account id embedded in the verified token.
        subject: u64,
        /// Account id the caller asserted.
        claimed: u64,
    },
}

/// Payment verification failures.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// The transaction reference was already consumed by a previous action.
    #[error("transaction reference already used: {0}")]
    AlreadyUsed(String),

    /// The transaction was mined but its execution status is failure.
    #[error("transaction failed on-chain")]
    TransactionFailed,

    /// The receipt contains no logs from the configured token contract.
    #[error("no token transfer found in transaction")]
    NoTransferFound,

    /// Transfer logs exist but none satisfied recipient, amount, and sender
    /// checks together.
    #[error("no transfer log satisfied recipient, amount, and sender checks")]
    NoValidPayment,

    /// A transfer with the right recipient and amount exists but was paid by
    /// a different wallet than the authenticated caller (hijacking attempt).
    #[error("payment sent by {actual}, but authenticated wallet is {expected}")]
    SenderMismatch {
        /// Wallet that actually emitted the transfer.
        actual: String,
        /// Wallet recovered from the caller's identity credential.
        expected: String,
    },

    /// The receipt did not become available within the configured bound.
    #[error("timed out waiting for transaction receipt")]
    Timeout,

    /// The transaction reference is not a well-formed 32-byte hash.
    #[error("invalid transaction reference: {0}")]
    InvalidReference(String),

    /// Underlying RPC provider failure.
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// Business-state conflicts, orthogonal to auth and payment.
#[derive(Error, Debug)]
pub enum ConflictError {
    /// A uniquely-keyed resource (e.g. a listing URL) already exists.
    #[error("resource already exists: {0}")]
    DuplicateResource(String),

    /// The featured slot is already rented and has not expired.
    #[error("slot {0} is already rented")]
    SlotTaken(u8),

    /// The caller does not own the resource (or it does not exist).
    #[error("account {0} does not own this resource")]
    NotOwner(u64),
}

/// Umbrella error for marketplace operations.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Identity verification failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Payment verification failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The business mutation conflicted; the payment proof remains unconsumed
    /// and may be retried against a corrected request.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// The request itself was malformed (bad URL, out-of-range slot index).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for marketplace operations.
pub type Result<T, E = MarketError> = std::result::Result<T, E>;

impl From<ethers::providers::ProviderError> for PaymentError {
    fn from(err: ethers::providers::ProviderError) -> Self {
        PaymentError::Rpc(err.to_string())
    }
}

impl From<ethers::core::types::SignatureError> for AuthError {
    fn from(err: ethers::core::types::SignatureError) -> Self {
        AuthError::InvalidSignature(err.to_string())
    }
}

impl MarketError {
    /// True when the failure left the payment proof unconsumed, so the caller
    /// may retry the business step without paying again.
    pub fn is_retryable_without_repayment(&self) -> bool {
        matches!(
            self,
            MarketError::Conflict(_) | MarketError::InvalidRequest(_)
        )
    }
}
