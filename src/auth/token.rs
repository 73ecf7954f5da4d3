//! Locally-issued session tokens.
//!
//! Symmetric HS256 signing with a single process-wide secret. These are the
//! tokens handed out at signup/login; federated tokens are verified in
//! `federated` instead.

use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::auth::claims::{TokenClaims, TokenPurpose};
use crate::auth::error::VerifyError;

/// Wire format of a locally-issued token's payload.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(rename = "type")]
    purpose: TokenPurpose,
    exp: i64,
    iat: i64,
}

/// Signs and verifies session tokens with the shared symmetric secret.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign a token for `subject` that expires `ttl` from now.
    pub fn sign(&self, subject: &str, purpose: TokenPurpose, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject.to_string(),
            purpose,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify signature and expiry, returning the claim set.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, VerifyError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Zero leeway: an elapsed TTL is expired, deterministically.
        validation.leeway = 0;
        validation.validate_aud = false;

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                    VerifyError::MalformedToken(e.to_string())
                }
                _ => VerifyError::SignatureInvalid,
            })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(VerifyError::MissingSubject);
        }

        Ok(TokenClaims {
            subject: claims.sub,
            email: None,
            purpose: Some(claims.purpose),
            issuer: None,
            audience: None,
            expires_at: Some(claims.exp),
            issued_at: Some(claims.iat),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let signer = TokenSigner::new("test-secret");
        let token = signer
            .sign("user-1", TokenPurpose::Access, Duration::minutes(30))
            .unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.subject, "user-1");
        assert_eq!(claims.purpose, Some(TokenPurpose::Access));
        assert!(claims.expires_at.unwrap() > claims.issued_at.unwrap());
    }

    #[test]
    fn test_refresh_purpose_roundtrip() {
        let signer = TokenSigner::new("test-secret");
        let token = signer
            .sign("user-2", TokenPurpose::Refresh, Duration::days(7))
            .unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.subject, "user-2");
        assert_eq!(claims.purpose, Some(TokenPurpose::Refresh));
    }

    #[test]
    fn test_elapsed_ttl_is_expired() {
        let signer = TokenSigner::new("test-secret");
        let token = signer
            .sign("user-1", TokenPurpose::Access, Duration::seconds(-30))
            .unwrap();

        let err = signer.verify(&token).unwrap_err();
        assert!(matches!(err, VerifyError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_signature_invalid() {
        let signer = TokenSigner::new("test-secret");
        let other = TokenSigner::new("different-secret");

        let token = signer
            .sign("user-1", TokenPurpose::Access, Duration::minutes(5))
            .unwrap();

        let err = other.verify(&token).unwrap_err();
        assert!(matches!(err, VerifyError::SignatureInvalid));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let signer = TokenSigner::new("test-secret");
        let err = signer.verify("not-a-token").unwrap_err();
        assert!(matches!(err, VerifyError::MalformedToken(_)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = TokenSigner::new("test-secret");
        let token = signer
            .sign("user-1", TokenPurpose::Access, Duration::minutes(5))
            .unwrap();

        // Swap the payload segment for a different one; the signature no
        // longer matches.
        let other = signer
            .sign("user-2", TokenPurpose::Access, Duration::minutes(5))
            .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert!(signer.verify(&forged).is_err());
    }
}
