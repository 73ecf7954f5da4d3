//! Error types for the authentication core.

use std::fmt;

use crate::types::KeyId;

/// Errors from the signing key-set cache.
#[derive(Debug, Clone)]
pub enum KeySetError {
    /// No key-set URL is configured; federated verification cannot run.
    Unconfigured,
    /// The key-set fetch failed (network error, timeout, non-2xx status,
    /// malformed payload). Transient: the previously cached set is left
    /// untouched and the next request retries.
    FetchFailed(String),
    /// The key set was fetched successfully but does not contain the
    /// requested key id. May indicate a rotation in progress.
    KeyNotFound(KeyId),
}

impl fmt::Display for KeySetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "key-set endpoint not configured"),
            Self::FetchFailed(msg) => write!(f, "failed to fetch key set: {}", msg),
            Self::KeyNotFound(kid) => write!(f, "signing key not found: {}", kid),
        }
    }
}

impl std::error::Error for KeySetError {}

/// Errors from a single verification attempt, either token family.
#[derive(Debug, Clone)]
pub enum VerifyError {
    /// The token could not be parsed at all, or its header lacks a key id.
    MalformedToken(String),
    /// Key resolution through the cache failed.
    KeySet(KeySetError),
    /// The signature does not verify against the resolved key.
    SignatureInvalid,
    /// The token's expiry has passed.
    Expired,
    /// The `iss` claim does not match the configured issuer.
    IssuerMismatch,
    /// The `aud` claim does not match the configured audience.
    AudienceMismatch,
    /// The verified claim set has no (or an empty) subject.
    MissingSubject,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedToken(msg) => write!(f, "malformed token: {}", msg),
            Self::KeySet(e) => write!(f, "{}", e),
            Self::SignatureInvalid => write!(f, "signature verification failed"),
            Self::Expired => write!(f, "token expired"),
            Self::IssuerMismatch => write!(f, "issuer mismatch"),
            Self::AudienceMismatch => write!(f, "audience mismatch"),
            Self::MissingSubject => write!(f, "token has no subject"),
        }
    }
}

impl std::error::Error for VerifyError {}

impl From<KeySetError> for VerifyError {
    fn from(e: KeySetError) -> Self {
        Self::KeySet(e)
    }
}

/// Caller-facing errors at the service boundary.
///
/// Verification-path detail never crosses this boundary: whatever went
/// wrong during token verification collapses to `Unauthenticated`.
#[derive(Debug)]
pub enum AuthError {
    /// Uniform rejection for any credential failure.
    Unauthenticated,
    /// Email or username is already registered.
    Conflict(String),
    /// The account exists but has been deactivated.
    UserDeactivated,
    /// The user store failed.
    Database(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "could not validate credentials"),
            Self::Conflict(msg) => write!(f, "{}", msg),
            Self::UserDeactivated => write!(f, "user account is deactivated"),
            Self::Database(msg) => write!(f, "database error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}
