//! Verification of federated tokens against the issuer's published keys.

use std::sync::Arc;

use jsonwebtoken::{Validation, decode, decode_header, errors::ErrorKind};
use serde::Deserialize;
use tracing::debug;

use crate::auth::claims::TokenClaims;
use crate::auth::error::VerifyError;
use crate::auth::jwks::KeySetCache;

/// Claim payload of a federated token.
#[derive(Debug, Deserialize)]
struct FederatedClaims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    /// `aud` may be a single string or an array; only the string form is
    /// surfaced in the claim set (validation handles both).
    #[serde(default)]
    aud: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
}

/// Verifies externally-issued tokens using the key-set cache.
#[derive(Clone)]
pub struct FederatedVerifier {
    key_set: Arc<KeySetCache>,
    issuer: Option<String>,
    audience: Option<String>,
}

impl FederatedVerifier {
    pub fn new(key_set: Arc<KeySetCache>, issuer: Option<String>, audience: Option<String>) -> Self {
        Self {
            key_set,
            issuer,
            audience,
        }
    }

    /// Verify a federated token: resolve its signing key by the header
    /// `kid`, check signature, expiry, issuer, and audience, then extract
    /// the subject.
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        let header = decode_header(token)
            .map_err(|e| VerifyError::MalformedToken(format!("invalid token header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::MalformedToken("missing kid in token header".to_string()))?;

        let entry = self.key_set.get_key(&kid).await?;

        let mut validation = Validation::new(entry.algorithm);
        validation.leeway = 0;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<FederatedClaims>(token, &entry.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::InvalidIssuer => VerifyError::IssuerMismatch,
                ErrorKind::InvalidAudience => VerifyError::AudienceMismatch,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::MissingRequiredClaim(_) => {
                    VerifyError::MalformedToken(e.to_string())
                }
                _ => VerifyError::SignatureInvalid,
            })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(VerifyError::MissingSubject);
        }

        debug!(subject = %claims.sub, "federated token verified");

        Ok(TokenClaims {
            subject: claims.sub,
            email: claims.email,
            purpose: None,
            issuer: claims.iss,
            audience: claims
                .aud
                .and_then(|v| v.as_str().map(|s| s.to_string())),
            expires_at: claims.exp,
            issued_at: claims.iat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::error::KeySetError;

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let verifier = FederatedVerifier::new(Arc::new(KeySetCache::new(None)), None, None);
        let err = verifier.verify("garbage").await.unwrap_err();
        assert!(matches!(err, VerifyError::MalformedToken(_)));
    }

    #[tokio::test]
    async fn test_missing_kid_is_malformed() {
        // A structurally valid HS256 token has no kid in its header.
        let signer = crate::auth::token::TokenSigner::new("secret");
        let token = signer
            .sign(
                "user-1",
                crate::auth::claims::TokenPurpose::Access,
                chrono::Duration::minutes(5),
            )
            .unwrap();

        let verifier = FederatedVerifier::new(Arc::new(KeySetCache::new(None)), None, None);
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, VerifyError::MalformedToken(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_key_set_propagates() {
        // Any token whose header does carry a kid reaches the cache and
        // must surface the configuration error unchanged.
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        header.kid = Some("some-key".to_string());
        let token = jsonwebtoken::encode(
            &header,
            &serde_json::json!({"sub": "u", "exp": 4102444800i64}),
            &jsonwebtoken::EncodingKey::from_secret(b"x"),
        )
        .unwrap();

        let verifier = FederatedVerifier::new(Arc::new(KeySetCache::new(None)), None, None);
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(
            err,
            VerifyError::KeySet(KeySetError::Unconfigured)
        ));
    }
}
