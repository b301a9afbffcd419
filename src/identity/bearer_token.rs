//! Bearer-token identity verification.
//!
//! Tokens are issued by a trusted third-party identity service and verified
//! against it. The service returns the token's claims ({subject, audience,
//! expiry}); the verifier checks the audience against the configured domain,
//! the expiry against the clock, and the subject against the caller-supplied
//! account id.

use crate::errors::AuthError;
use crate::identity::IdentityVerifier;
use crate::types::{Credential, IdentityClaim, TokenClaims, VerifiedIdentity};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Contract surface of the identity service: verify a token for a domain and
/// return its claims.
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Verifies `token` for `domain`, returning the embedded claims.
    async fn verify_token(&self, token: &str, domain: &str) -> Result<TokenClaims, AuthError>;
}

/// HTTP implementation of [`TokenService`].
pub struct HttpTokenService {
    http: Client,
    endpoint: Url,
}

impl HttpTokenService {
    /// Creates a service client against the given verification endpoint.
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl TokenService for HttpTokenService {
    async fn verify_token(&self, token: &str, domain: &str) -> Result<TokenClaims, AuthError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "token": token, "domain": domain }))
            .send()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("identity service unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidToken(format!(
                "rejected by identity service (status {})",
                response.status()
            )));
        }

        response
            .json::<TokenClaims>()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("bad identity service response: {}", e)))
    }
}

/// Verifies identity via a bearer token.
///
/// No wallet address is proven in this mode, so the resulting
/// [`VerifiedIdentity`] carries none and payment-sender cross-checking is not
/// performed downstream.
pub struct BearerTokenVerifier {
    service: Arc<dyn TokenService>,
    domain: String,
}

impl BearerTokenVerifier {
    /// Creates a verifier over an arbitrary token service.
    pub fn new(service: Arc<dyn TokenService>, domain: impl Into<String>) -> Self {
        Self {
            service,
            domain: domain.into(),
        }
    }

    /// Convenience constructor using the HTTP service implementation.
    pub fn over_http(endpoint: Url, domain: impl Into<String>) -> Self {
        Self::new(Arc::new(HttpTokenService::new(endpoint)), domain)
    }

    /// Cheap local well-formedness check before the service round trip:
    /// three dot-separated segments with base64url-decodable JSON claims.
    fn check_well_formed(token: &str) -> Result<(), AuthError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(AuthError::InvalidToken(
                "expected three token segments".to_string(),
            ));
        }

        let claims = URL_SAFE_NO_PAD
            .decode(segments[1])
            .map_err(|e| AuthError::InvalidToken(format!("undecodable claims segment: {}", e)))?;
        serde_json::from_slice::<serde_json::Value>(&claims)
            .map_err(|e| AuthError::InvalidToken(format!("claims are not JSON: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl IdentityVerifier for BearerTokenVerifier {
    async fn verify(&self, claim: &IdentityClaim) -> Result<VerifiedIdentity, AuthError> {
        let token = match &claim.credential {
            Credential::BearerToken { token } => token,
            Credential::SignedMessage { .. } => return Err(AuthError::MissingCredential),
        };

        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        Self::check_well_formed(token)?;

        let claims = self.service.verify_token(token, &self.domain).await?;

        if claims.aud != self.domain {
            warn!(
                account_id = claim.account_id,
                audience = %claims.aud,
                "token audience does not match configured domain"
            );
            return Err(AuthError::InvalidToken(format!(
                "audience '{}' is not '{}'",
                claims.aud, self.domain
            )));
        }

        if claims.exp <= current_timestamp() {
            return Err(AuthError::InvalidToken("token expired".to_string()));
        }

        if claims.sub != claim.account_id {
            return Err(AuthError::IdentityMismatch {
                subject: claims.sub,
                claimed: claim.account_id,
            });
        }

        debug!(account_id = claim.account_id, "bearer-token identity verified");

        Ok(VerifiedIdentity {
            account_id: claim.account_id,
            address: None,
        })
    }
}
