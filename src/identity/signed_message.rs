//! Signed-message identity verification (personal-sign recovery).

use crate::errors::AuthError;
use crate::identity::IdentityVerifier;
use crate::types::{Credential, IdentityClaim, SignInPayload, VerifiedIdentity};
use crate::utils::parse_signature_bytes;
use async_trait::async_trait;
use ethers::types::{Address, Signature};
use ethers::utils::hash_message;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Verifies identity by recovering the signer of an EIP-191 personal-sign
/// message.
///
/// The signed message is the JSON serialization of [`SignInPayload`], which
/// embeds the signer address and the caller's nonce as typed fields. The
/// verifier checks that the payload nonce equals the nonce supplied alongside
/// the signature, recovers the signer, and requires it to match the embedded
/// address. The recovered address is returned so payment verification can
/// cross-check the on-chain sender.
///
/// Nonces are additionally tracked in a per-process consumed set: replaying a
/// signature with a previously seen nonce fails even though the signature
/// itself is valid. The set is not shared across processes; horizontally
/// scaled deployments still rely on callers choosing high-entropy nonces.
///
/// This verifier does not prove that the wallet controls the claimed account
/// id on the social-identity graph. Callers that need that binding must
/// establish it out of band.
#[derive(Clone, Default)]
pub struct SignedMessageVerifier {
    used_nonces: Arc<RwLock<HashSet<String>>>,
}

impl SignedMessageVerifier {
    /// Creates a verifier with an empty consumed-nonce set.
    pub fn new() -> Self {
        Self::default()
    }

    fn recover_signer(message: &str, signature: &str) -> Result<Address, AuthError> {
        let sig_bytes = parse_signature_bytes(signature)?;
        let signature = Signature::try_from(sig_bytes.as_slice())
            .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;
        let digest = hash_message(message);
        Ok(signature.recover(digest)?)
    }
}

#[async_trait]
impl IdentityVerifier for SignedMessageVerifier {
    async fn verify(&self, claim: &IdentityClaim) -> Result<VerifiedIdentity, AuthError> {
        let (signature, message, nonce) = match &claim.credential {
            Credential::SignedMessage {
                signature,
                message,
                nonce,
            } => (signature, message, nonce),
            Credential::BearerToken { .. } => return Err(AuthError::MissingCredential),
        };

        if signature.is_empty() || message.is_empty() || nonce.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let payload: SignInPayload = serde_json::from_str(message)
            .map_err(|e| AuthError::InvalidSignature(format!("malformed sign-in payload: {}", e)))?;

        if payload.nonce != *nonce {
            warn!(account_id = claim.account_id, "sign-in nonce mismatch");
            return Err(AuthError::InvalidNonce(
                "message does not carry the supplied nonce".to_string(),
            ));
        }

        let declared: Address = payload
            .address
            .parse()
            .map_err(|_| AuthError::InvalidSignature(format!("bad address: {}", payload.address)))?;

        let recovered = Self::recover_signer(message, signature)?;
        if recovered != declared {
            warn!(
                account_id = claim.account_id,
                recovered = %format!("{:#x}", recovered),
                "recovered signer does not match declared address"
            );
            return Err(AuthError::InvalidSignature(format!(
                "recovered {:#x}, payload declares {:#x}",
                recovered, declared
            )));
        }

        // Consume the nonce only after the signature checks out, under one
        // write lock so concurrent replays resolve to a single winner.
        {
            let mut used = self.used_nonces.write().await;
            if !used.insert(nonce.clone()) {
                return Err(AuthError::InvalidNonce(format!(
                    "nonce already consumed: {}",
                    nonce
                )));
            }
        }

        debug!(
            account_id = claim.account_id,
            address = %format!("{:#x}", recovered),
            "signed-message identity verified"
        );

        Ok(VerifiedIdentity {
            account_id: claim.account_id,
            address: Some(recovered),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_nonce;
    use ethers::signers::{LocalWallet, Signer};

    async fn signed_claim(wallet: &LocalWallet, nonce: &str) -> IdentityClaim {
        let payload = SignInPayload {
            address: format!("{:#x}", wallet.address()),
            nonce: nonce.to_string(),
            statement: Some("Sign in to the marketplace".to_string()),
        };
        let message = serde_json::to_string(&payload).unwrap();
        let signature = wallet.sign_message(&message).await.unwrap();

        IdentityClaim {
            account_id: 194,
            credential: Credential::SignedMessage {
                signature: format!("0x{}", hex::encode(signature.to_vec())),
                message,
                nonce: nonce.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_valid_signature_recovers_address() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let verifier = SignedMessageVerifier::new();
        let claim = signed_claim(&wallet, &generate_nonce()).await;

        let identity = verifier.verify(&claim).await.unwrap();
        assert_eq!(identity.account_id, 194);
        assert_eq!(identity.address, Some(wallet.address()));
        // Rendered lower-cased for on-chain sender comparison.
        let hex = identity.address_hex().unwrap();
        assert_eq!(hex, hex.to_lowercase());
    }

    #[tokio::test]
    async fn test_tampered_signature_rejected() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let verifier = SignedMessageVerifier::new();
        let mut claim = signed_claim(&wallet, &generate_nonce()).await;

        if let Credential::SignedMessage { signature, .. } = &mut claim.credential {
            // Flip one signature byte.
            let mut bytes = parse_signature_bytes(signature).unwrap();
            bytes[10] ^= 0xff;
            *signature = format!("0x{}", hex::encode(bytes));
        }

        let err = verifier.verify(&claim).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn test_signature_by_other_wallet_rejected() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let impostor = LocalWallet::new(&mut rand::thread_rng());
        let verifier = SignedMessageVerifier::new();

        // Payload declares `wallet`, but `impostor` signs it.
        let nonce = generate_nonce();
        let payload = SignInPayload {
            address: format!("{:#x}", wallet.address()),
            nonce: nonce.clone(),
            statement: None,
        };
        let message = serde_json::to_string(&payload).unwrap();
        let signature = impostor.sign_message(&message).await.unwrap();

        let claim = IdentityClaim {
            account_id: 194,
            credential: Credential::SignedMessage {
                signature: format!("0x{}", hex::encode(signature.to_vec())),
                message,
                nonce,
            },
        };

        let err = verifier.verify(&claim).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn test_nonce_mismatch_rejected() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let verifier = SignedMessageVerifier::new();
        let mut claim = signed_claim(&wallet, "nonce-in-message").await;

        if let Credential::SignedMessage { nonce, .. } = &mut claim.credential {
            *nonce = "different-nonce".to_string();
        }

        let err = verifier.verify(&claim).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidNonce(_)));
    }

    #[tokio::test]
    async fn test_nonce_replay_rejected() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let verifier = SignedMessageVerifier::new();
        let claim = signed_claim(&wallet, "once-only").await;

        verifier.verify(&claim).await.unwrap();
        let err = verifier.verify(&claim).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidNonce(_)));
    }

    #[tokio::test]
    async fn test_unstructured_message_rejected() {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let verifier = SignedMessageVerifier::new();

        let message = "Address: 0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb\nNonce: abc";
        let signature = wallet.sign_message(message).await.unwrap();
        let claim = IdentityClaim {
            account_id: 194,
            credential: Credential::SignedMessage {
                signature: format!("0x{}", hex::encode(signature.to_vec())),
                message: message.to_string(),
                nonce: "abc".to_string(),
            },
        };

        let err = verifier.verify(&claim).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn test_bearer_credential_rejected() {
        let verifier = SignedMessageVerifier::new();
        let claim = IdentityClaim {
            account_id: 194,
            credential: Credential::BearerToken {
                token: "abc".to_string(),
            },
        };

        let err = verifier.verify(&claim).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }
}
